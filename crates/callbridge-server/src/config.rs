//! Server configuration loading from file and environment variables.

use callbridge_core::{session, SessionSettings};
use callbridge_voice::{OpenAiConfig, TwilioConfig, MAX_TTS_INPUT_CHARS};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Telephony account and webhook verification.
    #[serde(default)]
    pub twilio: TwilioConfig,

    /// Chat and speech provider.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Assistant persona and reply limits.
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Call-session retention and turn queue sizing.
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Audio file storage.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public host name used in callback and audio URLs (and for signature
    /// verification). When unset, the request's `Host` header is used.
    #[serde(default)]
    pub public_host: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "callbridge_core=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Phrase spoken when a call is first answered.
    #[serde(default = "default_greeting_text")]
    pub greeting_text: String,

    /// Replies longer than this many characters are cut before synthesis.
    #[serde(default = "default_max_response_chars")]
    pub max_response_chars: usize,

    /// Speech-recognition language tag.
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionsConfig {
    /// Seconds of inactivity after which a call session is forgotten.
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,

    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Turns that may wait for a worker before new ones are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Turns answered at the same time; later ones wait in the queue.
    #[serde(default = "default_max_concurrent_turns")]
    pub max_concurrent_turns: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory for greeting and reply audio.
    #[serde(default = "default_audio_dir")]
    pub audio_dir: String,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_system_prompt() -> String {
    "You are a friendly phone assistant. Answer in one or two short spoken sentences.".to_string()
}

fn default_greeting_text() -> String {
    "Hello! How can I help you today?".to_string()
}

fn default_max_response_chars() -> usize {
    600
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_idle_ttl_secs() -> u64 {
    session::DEFAULT_IDLE_TTL.as_secs()
}

fn default_max_sessions() -> usize {
    session::DEFAULT_MAX_SESSIONS
}

fn default_queue_capacity() -> usize {
    callbridge_core::worker::DEFAULT_QUEUE_CAPACITY
}

fn default_max_concurrent_turns() -> usize {
    callbridge_core::worker::DEFAULT_MAX_CONCURRENT_TURNS
}

fn default_audio_dir() -> String {
    "audio".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_host: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            greeting_text: default_greeting_text(),
            max_response_chars: default_max_response_chars(),
            language: default_language(),
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: default_idle_ttl_secs(),
            max_sessions: default_max_sessions(),
            queue_capacity: default_queue_capacity(),
            max_concurrent_turns: default_max_concurrent_turns(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            audio_dir: default_audio_dir(),
        }
    }
}

impl SessionsConfig {
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            idle_ttl: Duration::from_secs(self.idle_ttl_secs.max(1)),
            max_sessions: self.max_sessions.max(1),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

fn env_flag(value: &str) -> bool {
    value == "true" || value == "1"
}

/// Applies environment variable overrides on top of file values.
///
/// - `CALLBRIDGE_HOST` overrides `server.host`
/// - `CALLBRIDGE_PORT` overrides `server.port`
/// - `CALLBRIDGE_PUBLIC_HOST` overrides `server.public_host`
/// - `CALLBRIDGE_LOG_LEVEL` overrides `logging.level`
/// - `CALLBRIDGE_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `CALLBRIDGE_AUDIO_DIR` overrides `storage.audio_dir`
/// - `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN` override the telephony credentials
/// - `TWILIO_VERIFY_SIGNATURES` overrides `twilio.verify_signatures`
/// - `OPENAI_API_KEY` overrides `openai.api_key`
fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("CALLBRIDGE_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("CALLBRIDGE_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(public_host) = var("CALLBRIDGE_PUBLIC_HOST") {
        if !public_host.trim().is_empty() {
            config.server.public_host = Some(public_host.trim().to_string());
        }
    }
    if let Some(level) = var("CALLBRIDGE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("CALLBRIDGE_LOG_JSON") {
        config.logging.json = env_flag(&json);
    }
    if let Some(dir) = var("CALLBRIDGE_AUDIO_DIR") {
        config.storage.audio_dir = dir;
    }
    if let Some(sid) = var("TWILIO_ACCOUNT_SID") {
        config.twilio.account_sid = sid;
    }
    if let Some(token) = var("TWILIO_AUTH_TOKEN") {
        config.twilio.auth_token = token;
    }
    if let Some(verify) = var("TWILIO_VERIFY_SIGNATURES") {
        config.twilio.verify_signatures = env_flag(&verify);
    }
    if let Some(key) = var("OPENAI_API_KEY") {
        config.openai.api_key = key;
    }
}

/// Caps `assistant.max_response_chars` at what the speech endpoint accepts,
/// so a truncated reply is never too long to synthesize.
fn clamp_reply_length(config: &mut Config) {
    let max = config.assistant.max_response_chars;
    if max > MAX_TTS_INPUT_CHARS {
        tracing::warn!(
            configured = max,
            limit = MAX_TTS_INPUT_CHARS,
            "assistant.max_response_chars exceeds the speech input limit, clamping"
        );
        config.assistant.max_response_chars = MAX_TTS_INPUT_CHARS;
    }
}

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies environment overrides (see [`apply_env_overrides`]).
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    clamp_reply_length(&mut config);

    if config.twilio.verify_signatures && config.twilio.auth_token.is_empty() {
        tracing::warn!("signature verification is enabled but no auth token is configured; all webhooks will be rejected");
    }

    Ok(config)
}
