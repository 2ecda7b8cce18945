//! Per-call turn state machine.
//!
//! A call starts in `NEW` and moves to `GREETED` on its first call-start
//! event; that transition happens at most once per call identifier while the
//! session lives. Every state change is made synchronously before the first
//! `.await` of a handler, so concurrent webhooks for the same call cannot both
//! win the greeting or both pass the dedup gate.

use crate::dedup::DedupGate;
use crate::event::TranscriptEvent;
use crate::greeting::GreetingCache;
use crate::session::SessionStore;
use crate::twiml::{self, ListenOptions};
use crate::worker::{EnqueueError, FinalizeJob, TurnQueue};

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Language tag for speech recognition.
    pub language: String,
    /// Path of the transcript webhook, e.g. `/twilio/transcription`.
    pub transcription_path: String,
}

/// What happened to a transcript event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDisposition {
    /// Not a final result; dropped.
    Interim,
    /// Final but without text; dropped.
    Empty,
    /// No call identifier in the payload; dropped.
    MissingCallId,
    /// Repeats the last final within the dedup window; dropped.
    Duplicate,
    /// Handed to the turn worker.
    Enqueued,
    /// The worker queue refused the turn; dropped.
    QueueUnavailable,
}

#[derive(Clone)]
pub struct Orchestrator {
    sessions: SessionStore,
    dedup: DedupGate,
    greeting: GreetingCache,
    turns: TurnQueue,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        sessions: SessionStore,
        greeting: GreetingCache,
        turns: TurnQueue,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            dedup: DedupGate::new(sessions.clone()),
            sessions,
            greeting,
            turns,
            settings,
        }
    }

    /// Replaces the dedup gate, e.g. to use a different window.
    pub fn with_dedup(mut self, dedup: DedupGate) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    fn listen_markup(&self, host: &str, greeting_url: Option<&str>) -> String {
        let transcription_url = format!("https://{}{}", host, self.settings.transcription_path);
        let opts = ListenOptions {
            transcription_url: &transcription_url,
            language: &self.settings.language,
        };
        match greeting_url {
            Some(url) => twiml::greet_and_listen(url, &opts),
            None => twiml::listen(&opts),
        }
    }

    /// Handles a call-start webhook, fresh or re-entered after a redirect.
    ///
    /// The first call-start for an identifier plays the greeting; later ones
    /// only restart listening. If the greeting cannot be produced the call
    /// still starts listening.
    pub async fn call_start(&self, call_id: &str, host: &str) -> String {
        if call_id.is_empty() {
            tracing::warn!("call-start without call identifier, listening without greeting");
            return self.listen_markup(host, None);
        }

        // Mark before awaiting so a concurrent call-start sees the call as greeted.
        if !self.sessions.mark_greeted(call_id) {
            tracing::debug!(call_sid = call_id, "call already greeted, resuming listening");
            return self.listen_markup(host, None);
        }

        match self.greeting.ensure_greeting(host).await {
            Ok(url) => {
                tracing::info!(call_sid = call_id, "greeting new call");
                self.listen_markup(host, Some(&url))
            }
            Err(e) => {
                tracing::error!(
                    call_sid = call_id,
                    kind = e.kind(),
                    "greeting unavailable, listening without it: {}",
                    e
                );
                self.listen_markup(host, None)
            }
        }
    }

    /// Handles the resume webhook after a reply has played. Never greets.
    pub fn resume(&self, call_id: &str, host: &str) -> String {
        if !call_id.is_empty() {
            self.sessions.with_session(call_id, |_, _| ());
        }
        tracing::debug!(call_sid = call_id, "resuming listening");
        self.listen_markup(host, None)
    }

    /// Handles a transcript webhook. Only final, non-empty, non-duplicate
    /// text produces a turn; the turn itself runs on the worker queue.
    pub fn transcript(&self, event: &TranscriptEvent, host: &str) -> TurnDisposition {
        if !event.is_final {
            tracing::debug!(call_sid = %event.call_id, event_type = %event.event_type, "ignoring interim transcript");
            return TurnDisposition::Interim;
        }

        if event.text.is_empty() {
            tracing::debug!(call_sid = %event.call_id, "ignoring empty final transcript");
            return TurnDisposition::Empty;
        }

        if event.call_id.is_empty() {
            tracing::warn!("final transcript without call identifier, dropping");
            return TurnDisposition::MissingCallId;
        }

        if !self.dedup.should_process(&event.call_id, &event.text) {
            tracing::debug!(call_sid = %event.call_id, "suppressing duplicate final transcript");
            return TurnDisposition::Duplicate;
        }

        tracing::info!(call_sid = %event.call_id, chars = event.text.chars().count(), "final transcript received");

        let job = FinalizeJob {
            call_id: event.call_id.clone(),
            text: event.text.clone(),
            host: host.to_string(),
        };
        match self.turns.enqueue(job) {
            Ok(()) => TurnDisposition::Enqueued,
            Err(e @ (EnqueueError::Full | EnqueueError::Closed)) => {
                tracing::error!(call_sid = %event.call_id, "dropping turn: {}", e);
                TurnDisposition::QueueUnavailable
            }
        }
    }
}
