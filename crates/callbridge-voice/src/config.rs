use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

fn default_openai_base() -> String {
    "https://api.openai.com".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_tts_model() -> String {
    "gpt-4o-mini-tts".to_string()
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_twilio_base() -> String {
    "https://api.twilio.com".to_string()
}

fn default_verify_signatures() -> bool {
    true
}

/// Chat and speech provider settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_openai_base")]
    pub api_base: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_tts_model")]
    pub tts_model: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    /// Per-request timeout in seconds. Default: 30.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_openai_base(),
            chat_model: default_chat_model(),
            tts_model: default_tts_model(),
            voice: default_voice(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("chat_model", &self.chat_model)
            .field("tts_model", &self.tts_model)
            .field("voice", &self.voice)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl OpenAiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Telephony account settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct TwilioConfig {
    #[serde(default)]
    pub account_sid: String,
    #[serde(default, skip_serializing)]
    pub auth_token: String,
    #[serde(default = "default_twilio_base")]
    pub api_base: String,
    /// Reject webhooks whose signature does not verify. Default: true.
    #[serde(default = "default_verify_signatures")]
    pub verify_signatures: bool,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            api_base: default_twilio_base(),
            verify_signatures: default_verify_signatures(),
        }
    }
}

impl fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("verify_signatures", &self.verify_signatures)
            .finish()
    }
}

/// Builds the shared HTTP client used by every voice client.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}
