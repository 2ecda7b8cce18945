use callbridge_core::PipelineError;
use thiserror::Error;

/// Longest provider error body kept for logging.
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
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

    #[error("text too long for speech synthesis: {chars} characters (limit {limit})")]
    InputTooLong { chars: usize, limit: usize },

    #[error("invalid call identifier: {0:?}")]
    InvalidCallId(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl VoiceError {
    pub(crate) fn transport(service: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| VoiceError::Transport { service, source }
    }

    pub(crate) fn malformed(service: &'static str, message: impl Into<String>) -> Self {
        VoiceError::Malformed {
            service,
            message: message.into(),
        }
    }

    /// Builds a provider error from a non-success response, keeping a
    /// bounded prefix of the body.
    pub(crate) async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        VoiceError::Provider {
            service,
            status,
            body,
        }
    }
}

impl From<VoiceError> for PipelineError {
    fn from(err: VoiceError) -> Self {
        match err {
            VoiceError::Transport { service, source } => PipelineError::Transport {
                service,
                message: source.to_string(),
            },
            VoiceError::Provider {
                service,
                status,
                body,
            } => PipelineError::Provider {
                service,
                status,
                body,
            },
            VoiceError::Malformed { service, message } => {
                PipelineError::Malformed { service, message }
            }
            err @ VoiceError::InvalidCallId(_) => PipelineError::Malformed {
                service: "call-control",
                message: err.to_string(),
            },
            err @ VoiceError::InputTooLong { .. } => PipelineError::Malformed {
                service: "speech",
                message: err.to_string(),
            },
            VoiceError::Config(message) => PipelineError::Malformed {
                service: "config",
                message,
            },
        }
    }
}
