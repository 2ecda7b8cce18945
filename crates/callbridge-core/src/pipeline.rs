//! Collaborator contracts for producing and delivering a spoken reply.
//!
//! Implementations own their credentials and model identifiers; the
//! orchestrator only passes the per-turn inputs.

use crate::error::PipelineError;
use async_trait::async_trait;

/// Language-model chat endpoint.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the assistant's reply to `user_text`.
    async fn chat_reply(
        &self,
        system_prompt: Option<&str>,
        user_text: &str,
    ) -> Result<String, PipelineError>;
}

/// Speech-synthesis endpoint.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Renders `text` to a complete WAV file. Implementations must reject
    /// anything that is not a valid WAV container.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, PipelineError>;
}

/// Live call control.
#[async_trait]
pub trait CallControl: Send + Sync {
    /// Replaces the instructions of an in-progress call with `twiml`.
    async fn redirect_live_call(&self, call_id: &str, twiml: &str) -> Result<(), PipelineError>;
}
