//! Call-turn orchestration core for the Callbridge voice assistant.
//!
//! Turns telephony webhooks into conversation turns: verifies that a webhook
//! came from the provider, classifies transcript payloads, keeps a bounded
//! per-call session record (greeted flag and last final utterance), and
//! drives each finalized utterance through the chat, speech-synthesis and
//! call-redirect collaborators on a background worker queue.
//!
//! The collaborators themselves live behind the traits in [`pipeline`]; the
//! HTTP implementations are in `callbridge-voice`.

pub mod dedup;
pub mod error;
pub mod event;
pub mod greeting;
pub mod orchestrator;
pub mod pipeline;
pub mod session;
pub mod signature;
pub mod store;
pub mod twiml;
pub mod worker;

pub use dedup::{DedupGate, DEDUP_WINDOW};
pub use error::{PipelineError, StoreError};
pub use event::{classify, EventKind, TranscriptEvent};
pub use greeting::{GreetingCache, GREETING_FILE};
pub use orchestrator::{Orchestrator, OrchestratorSettings, TurnDisposition};
pub use pipeline::{CallControl, ChatModel, SpeechSynthesizer};
pub use session::{CallSession, SessionSettings, SessionStore};
pub use store::AudioStore;
pub use worker::{EnqueueError, FinalizeJob, FinalizerSettings, TurnFinalizer, TurnQueue};
