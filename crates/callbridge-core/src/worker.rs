//! Background execution of conversation turns.
//!
//! Webhook handlers only enqueue a [`FinalizeJob`]; a dispatcher task drains
//! the queue and runs every job in its own task, with at most
//! `max_concurrent` jobs in flight. While all workers are busy, jobs wait in
//! the bounded channel and further enqueues are refused. Each job's outcome,
//! including a panic, is logged by a monitor task, and nothing is retried.

use crate::error::PipelineError;
use crate::pipeline::{CallControl, ChatModel, SpeechSynthesizer};
use crate::store::AudioStore;
use crate::twiml;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

/// Default number of turns that may wait for a worker.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default number of turns processed at the same time.
pub const DEFAULT_MAX_CONCURRENT_TURNS: usize = 32;

/// One finalized utterance waiting to be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeJob {
    pub call_id: String,
    pub text: String,
    /// Public host used to build the audio and resume URLs.
    pub host: String,
}

#[derive(Debug, Clone)]
pub struct FinalizerSettings {
    pub system_prompt: Option<String>,
    pub max_response_chars: usize,
    /// Path of the resume webhook, e.g. `/twilio/resume`.
    pub resume_path: String,
}

/// Returns at most `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Produces and delivers the spoken reply for one utterance.
pub struct TurnFinalizer {
    chat: Arc<dyn ChatModel>,
    tts: Arc<dyn SpeechSynthesizer>,
    calls: Arc<dyn CallControl>,
    store: AudioStore,
    settings: FinalizerSettings,
}

impl TurnFinalizer {
    pub fn new(
        chat: Arc<dyn ChatModel>,
        tts: Arc<dyn SpeechSynthesizer>,
        calls: Arc<dyn CallControl>,
        store: AudioStore,
        settings: FinalizerSettings,
    ) -> Self {
        Self {
            chat,
            tts,
            calls,
            store,
            settings,
        }
    }

    /// Chat reply, synthesis, storage, then redirect of the live call.
    /// Returns the URL of the stored reply.
    pub async fn finalize(&self, job: &FinalizeJob) -> Result<String, PipelineError> {
        let reply = self
            .chat
            .chat_reply(self.settings.system_prompt.as_deref(), &job.text)
            .await?;
        let reply = truncate_chars(reply.trim(), self.settings.max_response_chars).trim_end();
        if reply.is_empty() {
            return Err(PipelineError::Malformed {
                service: "chat",
                message: "empty reply".to_string(),
            });
        }
        tracing::debug!(call_sid = %job.call_id, chars = reply.chars().count(), "chat reply received");

        let audio = self.tts.synthesize(reply).await?;

        let name = AudioStore::new_reply_name();
        self.store.write_atomic(&name, &audio).await?;
        let audio_url = AudioStore::url_for(&job.host, &name);

        let resume_url = format!("https://{}{}", job.host, self.settings.resume_path);
        let markup = twiml::play_then_redirect(&audio_url, &resume_url);
        self.calls.redirect_live_call(&job.call_id, &markup).await?;

        tracing::info!(call_sid = %job.call_id, file = %name, "reply delivered to call");
        Ok(audio_url)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("turn queue is full")]
    Full,
    #[error("turn queue is closed")]
    Closed,
}

/// Sending side of the turn queue.
#[derive(Clone, Debug)]
pub struct TurnQueue {
    tx: mpsc::Sender<FinalizeJob>,
}

impl TurnQueue {
    /// Starts the dispatcher and returns the queue handle together with the
    /// dispatcher's join handle. `capacity` jobs may wait while
    /// `max_concurrent` are running. The dispatcher stops once every
    /// [`TurnQueue`] clone is dropped.
    pub fn start(
        finalizer: Arc<TurnFinalizer>,
        capacity: usize,
        max_concurrent: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let workers = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let handle = tokio::spawn(dispatch(rx, finalizer, workers));
        (Self { tx }, handle)
    }

    /// Queues a job without waiting.
    pub fn enqueue(&self, job: FinalizeJob) -> Result<(), EnqueueError> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }
}

async fn dispatch(
    mut rx: mpsc::Receiver<FinalizeJob>,
    finalizer: Arc<TurnFinalizer>,
    workers: Arc<Semaphore>,
) {
    tracing::info!(
        max_concurrent = workers.available_permits(),
        "turn dispatcher started"
    );

    loop {
        // Wait for a free worker before taking the next job, so a slow
        // pipeline backs up into the bounded channel.
        let Ok(permit) = workers.clone().acquire_owned().await else {
            break;
        };
        let Some(job) = rx.recv().await else {
            break;
        };

        let call_id = job.call_id.clone();
        let finalizer = finalizer.clone();
        let work = tokio::spawn(async move {
            let result = finalizer.finalize(&job).await;
            drop(permit);
            result
        });

        tokio::spawn(async move {
            match work.await {
                Ok(Ok(url)) => {
                    tracing::debug!(call_sid = %call_id, url = %url, "turn finished");
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        call_sid = %call_id,
                        kind = e.kind(),
                        "turn failed, call keeps listening: {}",
                        e
                    );
                }
                Err(e) if e.is_panic() => {
                    tracing::error!(call_sid = %call_id, "turn task panicked: {}", e);
                }
                Err(e) => {
                    tracing::error!(call_sid = %call_id, "turn task join error: {}", e);
                }
            }
        });
    }

    tracing::info!("turn dispatcher stopped");
}
