//! Short-window suppression of repeated final transcripts.
//!
//! Providers sometimes deliver the same final result more than once (for
//! example a content event followed by a stopped event carrying the same
//! text). Identical text for the same call within [`DEDUP_WINDOW`] is
//! processed once.
//!
//! Suppressed duplicates do not refresh the stored timestamp, so the window
//! is anchored at the first accepted delivery and never slides.

use crate::session::{LastFinal, SessionStore};
use std::time::Duration;

/// Window within which identical final text for a call is suppressed.
pub const DEDUP_WINDOW: Duration = Duration::from_millis(5000);

#[derive(Clone, Debug)]
pub struct DedupGate {
    sessions: SessionStore,
    window: Duration,
}

impl DedupGate {
    pub fn new(sessions: SessionStore) -> Self {
        Self::with_window(sessions, DEDUP_WINDOW)
    }

    pub fn with_window(sessions: SessionStore, window: Duration) -> Self {
        Self { sessions, window }
    }

    /// Returns `false` when `text` repeats the last accepted final for
    /// `call_id` within the window; otherwise records it and returns `true`.
    pub fn should_process(&self, call_id: &str, text: &str) -> bool {
        let window = self.window;
        self.sessions.with_session(call_id, |session, now| {
            let duplicate = session
                .last_final
                .as_ref()
                .is_some_and(|last| last.text == text && now.duration_since(last.at) < window);

            if duplicate {
                return false;
            }

            session.last_final = Some(LastFinal {
                text: text.to_string(),
                at: now,
            });
            true
        })
    }
}
