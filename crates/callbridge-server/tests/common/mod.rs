//! Shared fixtures: an app state wired to recording collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use callbridge_core::worker::FinalizerSettings;
use callbridge_core::{
    AudioStore, CallControl, ChatModel, GreetingCache, Orchestrator, OrchestratorSettings,
    PipelineError, SessionSettings, SessionStore, SpeechSynthesizer, TurnFinalizer, TurnQueue,
};
use callbridge_server::{AppState, WebhookSettings, RESUME_PATH, TRANSCRIPTION_PATH};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const HOST: &str = "bridge.example.com";
pub const AUTH_TOKEN: &str = "12345";

pub fn wav() -> Vec<u8> {
    let mut bytes = b"RIFF".to_vec();
    bytes.extend_from_slice(&36u32.to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes
}

#[derive(Default)]
pub struct RecordingChat {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ChatModel for RecordingChat {
    async fn chat_reply(
        &self,
        _system_prompt: Option<&str>,
        user_text: &str,
    ) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("You said {}", user_text))
    }
}

#[derive(Default)]
pub struct RecordingTts {
    pub calls: AtomicUsize,
}

#[async_trait]
impl SpeechSynthesizer for RecordingTts {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(wav())
    }
}

pub struct RecordingCalls {
    pub calls: AtomicUsize,
    tx: mpsc::UnboundedSender<(String, String)>,
}

#[async_trait]
impl CallControl for RecordingCalls {
    async fn redirect_live_call(&self, call_id: &str, twiml: &str) -> Result<(), PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.tx.send((call_id.to_string(), twiml.to_string()));
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub chat: Arc<RecordingChat>,
    pub tts: Arc<RecordingTts>,
    pub calls: Arc<RecordingCalls>,
    pub redirects: mpsc::UnboundedReceiver<(String, String)>,
    pub dir: tempfile::TempDir,
}

impl TestApp {
    pub async fn next_redirect(&mut self) -> (String, String) {
        tokio::time::timeout(Duration::from_secs(5), self.redirects.recv())
            .await
            .expect("redirect should arrive")
            .expect("redirect channel open")
    }
}

pub fn test_app(verify_signatures: bool) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store = AudioStore::new(dir.path());
    let chat = Arc::new(RecordingChat::default());
    let tts = Arc::new(RecordingTts::default());
    let (tx, redirects) = mpsc::unbounded_channel();
    let calls = Arc::new(RecordingCalls {
        calls: AtomicUsize::new(0),
        tx,
    });

    let finalizer = TurnFinalizer::new(
        chat.clone(),
        tts.clone(),
        calls.clone(),
        store.clone(),
        FinalizerSettings {
            system_prompt: None,
            max_response_chars: 600,
            resume_path: RESUME_PATH.to_string(),
        },
    );
    let (turns, _dispatcher) = TurnQueue::start(Arc::new(finalizer), 16, 4);

    let orchestrator = Orchestrator::new(
        SessionStore::new(SessionSettings::default()),
        GreetingCache::new(store.clone(), tts.clone(), "Welcome!"),
        turns,
        OrchestratorSettings {
            language: "en-US".to_string(),
            transcription_path: TRANSCRIPTION_PATH.to_string(),
        },
    );

    let state = AppState {
        orchestrator,
        audio_store: store,
        webhooks: WebhookSettings {
            public_host: Some(HOST.to_string()),
            auth_token: AUTH_TOKEN.to_string(),
            verify_signatures,
        },
    };

    TestApp {
        state,
        chat,
        tts,
        calls,
        redirects,
        dir,
    }
}

pub fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .header("host", HOST)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
