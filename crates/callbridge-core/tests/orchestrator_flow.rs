//! End-to-end turn handling with recording collaborators.

use async_trait::async_trait;
use callbridge_core::worker::FinalizerSettings;
use callbridge_core::{
    AudioStore, CallControl, ChatModel, DedupGate, GreetingCache, Orchestrator,
    OrchestratorSettings, PipelineError, SessionSettings, SessionStore, SpeechSynthesizer,
    TranscriptEvent, TurnDisposition, TurnFinalizer, TurnQueue,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

const HOST: &str = "bridge.example.com";
const WAV: &[u8] = b"RIFF\x24\x00\x00\x00WAVEfmt ";

#[derive(Default)]
struct FakeChat {
    calls: AtomicUsize,
    fail: bool,
    /// When set, each reply waits for a permit from this gate.
    gate: Option<Arc<Semaphore>>,
}

#[async_trait]
impl ChatModel for FakeChat {
    async fn chat_reply(
        &self,
        _system_prompt: Option<&str>,
        user_text: &str,
    ) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.fail {
            return Err(PipelineError::Transport {
                service: "chat",
                message: "connection refused".to_string(),
            });
        }
        Ok(format!("You said {}. That is a long answer.", user_text))
    }
}

#[derive(Default)]
struct FakeTts {
    calls: AtomicUsize,
    texts: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl SpeechSynthesizer for FakeTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());
        Ok(WAV.to_vec())
    }
}

struct FakeCalls {
    tx: mpsc::UnboundedSender<(String, String)>,
}

#[async_trait]
impl CallControl for FakeCalls {
    async fn redirect_live_call(&self, call_id: &str, twiml: &str) -> Result<(), PipelineError> {
        let _ = self.tx.send((call_id.to_string(), twiml.to_string()));
        Ok(())
    }
}

struct Harness {
    orchestrator: Orchestrator,
    chat: Arc<FakeChat>,
    tts: Arc<FakeTts>,
    redirects: mpsc::UnboundedReceiver<(String, String)>,
    dir: tempfile::TempDir,
}

fn harness(chat: FakeChat, window: Duration) -> Harness {
    harness_with_queue(chat, window, 16, 4)
}

fn harness_with_queue(
    chat: FakeChat,
    window: Duration,
    capacity: usize,
    max_concurrent: usize,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = AudioStore::new(dir.path());
    let chat = Arc::new(chat);
    let tts = Arc::new(FakeTts::default());
    let (tx, redirects) = mpsc::unbounded_channel();

    let finalizer = TurnFinalizer::new(
        chat.clone(),
        tts.clone(),
        Arc::new(FakeCalls { tx }),
        store.clone(),
        FinalizerSettings {
            system_prompt: Some("Be brief.".to_string()),
            max_response_chars: 12,
            resume_path: "/twilio/resume".to_string(),
        },
    );
    let (turns, _dispatcher) = TurnQueue::start(Arc::new(finalizer), capacity, max_concurrent);

    let sessions = SessionStore::new(SessionSettings::default());
    let greeting = GreetingCache::new(store, tts.clone(), "Welcome!");
    let orchestrator = Orchestrator::new(
        sessions.clone(),
        greeting,
        turns,
        OrchestratorSettings {
            language: "en-US".to_string(),
            transcription_path: "/twilio/transcription".to_string(),
        },
    )
    .with_dedup(DedupGate::with_window(sessions, window));

    Harness {
        orchestrator,
        chat,
        tts,
        redirects,
        dir,
    }
}

fn final_event(call_id: &str, text: &str) -> TranscriptEvent {
    TranscriptEvent {
        call_id: call_id.to_string(),
        event_type: "transcription-content".to_string(),
        text: text.to_string(),
        is_final: true,
    }
}

async fn next_redirect(h: &mut Harness) -> (String, String) {
    tokio::time::timeout(Duration::from_secs(5), h.redirects.recv())
        .await
        .expect("redirect should arrive")
        .expect("redirect channel open")
}

#[tokio::test]
async fn greeting_plays_once_per_call() {
    let h = harness(FakeChat::default(), Duration::from_secs(5));

    let first = h.orchestrator.call_start("CA1", HOST).await;
    assert!(first.contains("<Play>https://bridge.example.com/audio/greeting.wav</Play>"));
    assert!(first.contains("<Start><Transcription"));
    assert!(h.orchestrator.sessions().is_greeted("CA1"));

    let second = h.orchestrator.call_start("CA1", HOST).await;
    assert!(!second.contains("<Play>"));
    assert!(second.contains("<Start><Transcription"));

    // The greeting clip is shared by later calls.
    let other = h.orchestrator.call_start("CA2", HOST).await;
    assert!(other.contains("greeting.wav"));
    assert_eq!(h.tts.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn resume_never_greets() {
    let h = harness(FakeChat::default(), Duration::from_secs(5));

    let xml = h.orchestrator.resume("CA9", HOST);
    assert!(!xml.contains("<Play>"));
    assert!(xml.contains(r#"statusCallbackUrl="https://bridge.example.com/twilio/transcription""#));
    assert_eq!(h.tts.calls.load(Ordering::SeqCst), 0);
    assert!(!h.orchestrator.sessions().is_greeted("CA9"));
}

#[tokio::test]
async fn final_transcript_runs_one_turn_and_duplicates_are_dropped() {
    let mut h = harness(FakeChat::default(), Duration::from_secs(5));
    h.orchestrator.call_start("CA1", HOST).await;
    let greeting_synths = h.tts.calls.load(Ordering::SeqCst);

    let disposition = h.orchestrator.transcript(&final_event("CA1", "hello"), HOST);
    assert_eq!(disposition, TurnDisposition::Enqueued);

    let (call_id, markup) = next_redirect(&mut h).await;
    assert_eq!(call_id, "CA1");
    assert!(markup.contains("<Play>https://bridge.example.com/audio/reply-"));
    assert!(markup.contains(r#"<Redirect method="POST">https://bridge.example.com/twilio/resume</Redirect>"#));
    assert_eq!(h.chat.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.tts.calls.load(Ordering::SeqCst), greeting_synths + 1);

    // The reply was truncated before synthesis.
    let texts = h.tts.texts.lock().unwrap().clone();
    assert_eq!(texts.last().unwrap(), "You said hel");

    // The stored reply is the file the markup points at.
    let start = markup.find("reply-").unwrap();
    let end = markup[start..].find("</Play>").unwrap() + start;
    assert!(h.dir.path().join(&markup[start..end]).exists());

    let duplicate = h.orchestrator.transcript(&final_event("CA1", "hello"), HOST);
    assert_eq!(duplicate, TurnDisposition::Duplicate);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.chat.calls.load(Ordering::SeqCst), 1);
    assert!(h.redirects.try_recv().is_err());
}

#[tokio::test]
async fn duplicate_after_window_runs_again_with_fresh_audio() {
    let mut h = harness(FakeChat::default(), Duration::from_millis(200));

    assert_eq!(
        h.orchestrator.transcript(&final_event("CA1", "hello"), HOST),
        TurnDisposition::Enqueued
    );
    let (_, first) = next_redirect(&mut h).await;

    assert_eq!(
        h.orchestrator.transcript(&final_event("CA1", "hello"), HOST),
        TurnDisposition::Duplicate
    );

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(
        h.orchestrator.transcript(&final_event("CA1", "hello"), HOST),
        TurnDisposition::Enqueued
    );
    let (_, second) = next_redirect(&mut h).await;

    assert_eq!(h.chat.calls.load(Ordering::SeqCst), 2);
    assert_ne!(first, second);
}

#[tokio::test]
async fn interim_and_empty_transcripts_do_nothing() {
    let h = harness(FakeChat::default(), Duration::from_secs(5));

    let mut interim = final_event("CA1", "hel");
    interim.is_final = false;
    assert_eq!(h.orchestrator.transcript(&interim, HOST), TurnDisposition::Interim);
    assert_eq!(
        h.orchestrator.transcript(&final_event("CA1", ""), HOST),
        TurnDisposition::Empty
    );
    assert_eq!(
        h.orchestrator.transcript(&final_event("", "hello"), HOST),
        TurnDisposition::MissingCallId
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.chat.calls.load(Ordering::SeqCst), 0);
    assert!(h.orchestrator.sessions().get("CA1").is_none());
}

#[tokio::test]
async fn failed_turn_leaves_call_listening() {
    let mut h = harness(
        FakeChat {
            fail: true,
            ..FakeChat::default()
        },
        Duration::from_secs(5),
    );
    h.orchestrator.call_start("CA1", HOST).await;

    assert_eq!(
        h.orchestrator.transcript(&final_event("CA1", "hello"), HOST),
        TurnDisposition::Enqueued
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.chat.calls.load(Ordering::SeqCst), 1);
    assert!(h.redirects.try_recv().is_err());

    // The call is still greeted and accepts a new utterance.
    assert!(h.orchestrator.sessions().is_greeted("CA1"));
    assert_eq!(
        h.orchestrator.transcript(&final_event("CA1", "are you there"), HOST),
        TurnDisposition::Enqueued
    );
}

#[tokio::test]
async fn concurrent_call_starts_greet_once() {
    let h = harness(FakeChat::default(), Duration::from_secs(5));

    let (a, b) = tokio::join!(
        h.orchestrator.call_start("CA1", HOST),
        h.orchestrator.call_start("CA1", HOST)
    );

    let greeted = [&a, &b].iter().filter(|xml| xml.contains("<Play>")).count();
    assert_eq!(greeted, 1);
    assert!(a.contains("<Start><Transcription") && b.contains("<Start><Transcription"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_finals_enqueue_once() {
    let h = harness(FakeChat::default(), Duration::from_secs(5));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move { orchestrator.transcript(&final_event("CA1", "hello"), HOST) })
        })
        .collect();

    let mut enqueued = 0;
    for task in tasks {
        match task.await.unwrap() {
            TurnDisposition::Enqueued => enqueued += 1,
            other => assert_eq!(other, TurnDisposition::Duplicate),
        }
    }
    assert_eq!(enqueued, 1);
}

#[tokio::test]
async fn busy_pipeline_fills_queue_and_refuses_turns() {
    let gate = Arc::new(Semaphore::new(0));
    let mut h = harness_with_queue(
        FakeChat {
            gate: Some(gate.clone()),
            ..FakeChat::default()
        },
        Duration::from_secs(5),
        1,
        1,
    );

    // First turn occupies the only worker.
    assert_eq!(
        h.orchestrator.transcript(&final_event("CA1", "one"), HOST),
        TurnDisposition::Enqueued
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.chat.calls.load(Ordering::SeqCst), 1);

    // Second waits in the queue, third finds it full.
    assert_eq!(
        h.orchestrator.transcript(&final_event("CA2", "two"), HOST),
        TurnDisposition::Enqueued
    );
    assert_eq!(
        h.orchestrator.transcript(&final_event("CA3", "three"), HOST),
        TurnDisposition::QueueUnavailable
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.chat.calls.load(Ordering::SeqCst), 1);

    // Releasing the worker lets the queued turn run.
    gate.add_permits(2);
    let (first, _) = next_redirect(&mut h).await;
    let (second, _) = next_redirect(&mut h).await;
    assert_eq!(first, "CA1");
    assert_eq!(second, "CA2");
    assert_eq!(h.chat.calls.load(Ordering::SeqCst), 2);
}
