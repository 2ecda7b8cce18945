use thiserror::Error;

/// Failure of one step of a conversation turn.
///
/// The variants keep transport, provider-reported and malformed-response
/// failures apart so they can be logged distinctly. The orchestrator treats
/// all of them the same way: log the error and drop the turn.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{service} transport error: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned status {status}: {body}")]
    Provider {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("malformed {service} response: {message}")]
    Malformed {
        service: &'static str,
        message: String,
    },

    #[error("audio storage error: {0}")]
    Storage(#[from] StoreError),
}

impl PipelineError {
    /// Short label for structured logging.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Transport { .. } => "transport",
            PipelineError::Provider { .. } => "provider",
            PipelineError::Malformed { .. } => "malformed",
            PipelineError::Storage(_) => "storage",
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid audio file name: {0}")]
    InvalidName(String),

    #[error("audio file not found: {0}")]
    NotFound(String),

    #[error("audio file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
