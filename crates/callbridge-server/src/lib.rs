//! Callbridge server library logic.

pub mod api;
pub mod api_audio;
pub mod api_webhook;
pub mod background;
pub mod config;
pub mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use callbridge_core::worker::FinalizerSettings;
use callbridge_core::{
    AudioStore, GreetingCache, Orchestrator, OrchestratorSettings, SessionStore, TurnFinalizer,
    TurnQueue,
};
use callbridge_voice::{http_client, CallControlClient, ChatClient, SpeechClient};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Call-start webhook path.
pub const CALL_START_PATH: &str = "/twilio/voice";
/// Resume webhook path, targeted by the redirect after a reply.
pub const RESUME_PATH: &str = "/twilio/resume";
/// Transcript webhook path, registered as the transcription callback.
pub const TRANSCRIPTION_PATH: &str = "/twilio/transcription";

/// Maximum request body size (256 KiB). Webhooks are small form posts.
const MAX_REQUEST_BODY_BYTES: usize = 256 * 1024;

/// Webhook URL and verification settings.
#[derive(Clone)]
pub struct WebhookSettings {
    /// Host used for absolute URLs; `None` falls back to the `Host` header.
    pub public_host: Option<String>,
    /// Secret used to verify webhook signatures.
    pub auth_token: String,
    pub verify_signatures: bool,
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Per-call turn state machine.
    pub orchestrator: Orchestrator,
    /// Greeting and reply audio.
    pub audio_store: AudioStore,
    pub webhooks: WebhookSettings,
}

impl AppState {
    /// Wires the HTTP collaborators, starts the turn dispatcher and builds
    /// the state. Must be called inside a Tokio runtime.
    pub fn from_config(config: &config::Config) -> Result<Self, reqwest::Error> {
        let http = http_client(config.openai.request_timeout())?;
        let chat = Arc::new(ChatClient::new(&config.openai, http.clone()));
        let speech = Arc::new(SpeechClient::new(&config.openai, http.clone()));
        let calls = Arc::new(CallControlClient::new(&config.twilio, http));

        let audio_store = AudioStore::new(&config.storage.audio_dir);
        let sessions = SessionStore::new(config.sessions.session_settings());
        let greeting = GreetingCache::new(
            audio_store.clone(),
            speech.clone(),
            config.assistant.greeting_text.clone(),
        );

        let system_prompt = Some(config.assistant.system_prompt.clone())
            .filter(|prompt| !prompt.trim().is_empty());
        let finalizer = TurnFinalizer::new(
            chat,
            speech,
            calls,
            audio_store.clone(),
            FinalizerSettings {
                system_prompt,
                max_response_chars: config.assistant.max_response_chars,
                resume_path: RESUME_PATH.to_string(),
            },
        );
        let (turns, _dispatcher) = TurnQueue::start(
            Arc::new(finalizer),
            config.sessions.queue_capacity,
            config.sessions.max_concurrent_turns,
        );

        let orchestrator = Orchestrator::new(
            sessions,
            greeting,
            turns,
            OrchestratorSettings {
                language: config.assistant.language.clone(),
                transcription_path: TRANSCRIPTION_PATH.to_string(),
            },
        );

        Ok(Self {
            orchestrator,
            audio_store,
            webhooks: WebhookSettings {
                public_host: config.server.public_host.clone(),
                auth_token: config.twilio.auth_token.clone(),
                verify_signatures: config.twilio.verify_signatures,
            },
        })
    }
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let webhook_routes = Router::new()
        .route(CALL_START_PATH, post(api_webhook::call_start_handler))
        .route(RESUME_PATH, post(api_webhook::resume_handler))
        .route(TRANSCRIPTION_PATH, post(api_webhook::transcription_handler))
        .layer(axum::middleware::from_fn(middleware::signature_middleware))
        .layer(DefaultBodyLimit::max(middleware::MAX_WEBHOOK_BODY_BYTES));

    Router::new()
        .route("/health", get(health))
        // `get` also answers HEAD with the body stripped.
        .route("/audio/{file}", get(api_audio::get_audio_handler))
        .merge(webhook_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
