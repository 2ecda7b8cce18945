//! Bounded per-call session records.
//!
//! A session remembers whether the caller has been greeted and the last final
//! utterance that was processed. Sessions are created on first use, expire
//! after a period of inactivity, and the store never holds more than
//! `max_sessions` records: inserting past the bound evicts the session that
//! was seen least recently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Default inactivity period after which a session is swept.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

/// Default upper bound on live sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub idle_ttl: Duration,
    pub max_sessions: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_ttl: DEFAULT_IDLE_TTL,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

/// The last final utterance accepted for a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastFinal {
    pub text: String,
    pub at: Instant,
}

/// State kept for one call identifier.
#[derive(Debug, Clone)]
pub struct CallSession {
    pub call_id: String,
    pub greeted: bool,
    pub last_final: Option<LastFinal>,
    pub last_seen: Instant,
}

impl CallSession {
    pub fn new(call_id: impl Into<String>, now: Instant) -> Self {
        Self {
            call_id: call_id.into(),
            greeted: false,
            last_final: None,
            last_seen: now,
        }
    }

    fn is_expired(&self, now: Instant, idle_ttl: Duration) -> bool {
        now.duration_since(self.last_seen) > idle_ttl
    }
}

/// Process-wide call-session store.
///
/// The lock is only held for short map operations and never across an
/// `.await`, so a synchronous mutex is used.
#[derive(Clone, Debug)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, CallSession>>>,
    settings: SessionSettings,
}

impl SessionStore {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            settings,
        }
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CallSession>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("session store lock poisoned, recovering with stale state");
                poisoned.into_inner()
            }
        }
    }

    /// Runs `f` against the session for `call_id`, creating it if needed and
    /// marking it as seen now.
    ///
    /// An expired session is replaced by a fresh one rather than revived.
    pub fn with_session<R>(&self, call_id: &str, f: impl FnOnce(&mut CallSession, Instant) -> R) -> R {
        let now = Instant::now();
        let mut sessions = self.lock();

        let expired = sessions
            .get(call_id)
            .is_some_and(|s| s.is_expired(now, self.settings.idle_ttl));
        if expired {
            sessions.remove(call_id);
        }

        if !sessions.contains_key(call_id) && sessions.len() >= self.settings.max_sessions.max(1) {
            evict_least_recent(&mut sessions);
        }

        let session = sessions.entry(call_id.to_string()).or_insert_with(|| {
            tracing::debug!(call_sid = call_id, "creating call session");
            CallSession::new(call_id, now)
        });
        session.last_seen = now;
        f(session, now)
    }

    /// Marks the call as greeted. Returns `true` only for the call that made
    /// the transition.
    pub fn mark_greeted(&self, call_id: &str) -> bool {
        self.with_session(call_id, |session, _| {
            if session.greeted {
                false
            } else {
                session.greeted = true;
                true
            }
        })
    }

    /// Whether a live session exists and has been greeted. Does not create a
    /// session.
    pub fn is_greeted(&self, call_id: &str) -> bool {
        let now = Instant::now();
        self.lock()
            .get(call_id)
            .is_some_and(|s| s.greeted && !s.is_expired(now, self.settings.idle_ttl))
    }

    /// Snapshot of a session, if present.
    pub fn get(&self, call_id: &str) -> Option<CallSession> {
        self.lock().get(call_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes every session idle for longer than the configured TTL.
    /// Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let idle_ttl = self.settings.idle_ttl;
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now, idle_ttl));
        before - sessions.len()
    }
}

fn evict_least_recent(sessions: &mut HashMap<String, CallSession>) {
    let oldest = sessions
        .values()
        .min_by_key(|s| s.last_seen)
        .map(|s| s.call_id.clone());
    if let Some(call_id) = oldest {
        tracing::debug!(call_sid = %call_id, "session store full, evicting least recent session");
        sessions.remove(&call_id);
    }
}
