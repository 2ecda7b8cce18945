//! Remote voice services for the Callbridge assistant.
//!
//! HTTP clients for the three collaborators a conversation turn needs: the
//! chat-completion endpoint that writes the reply, the speech endpoint that
//! renders it to WAV audio, and the telephony REST API that redirects the
//! live call to play it. Each client implements the matching trait from
//! `callbridge_core::pipeline`.

pub mod call_control;
pub mod chat;
pub mod config;
pub mod error;
pub mod tts;

pub use call_control::CallControlClient;
pub use chat::ChatClient;
pub use config::{http_client, OpenAiConfig, TwilioConfig};
pub use error::VoiceError;
pub use tts::{check_input, validate_wav, SpeechClient, MAX_TTS_INPUT_CHARS};
