//! Background tasks for the Callbridge server.
//!
//! Includes:
//! - Sweeping idle call sessions.

use callbridge_core::SessionStore;
use std::time::Duration;

/// Interval between sweeps: half the idle TTL, clamped to [1, 60] seconds.
pub fn sweep_interval(idle_ttl: Duration) -> Duration {
    Duration::from_secs((idle_ttl.as_secs() / 2).clamp(1, 60))
}

/// Starts the session sweep task.
///
/// This task runs indefinitely, periodically removing call sessions that
/// have been idle for longer than the store's TTL.
pub async fn start_session_sweep_task(sessions: SessionStore) {
    let idle_ttl = sessions.settings().idle_ttl;
    let interval = sweep_interval(idle_ttl);

    tracing::info!(
        idle_ttl_seconds = idle_ttl.as_secs(),
        interval_seconds = interval.as_secs(),
        "starting session sweep task"
    );

    loop {
        tokio::time::sleep(interval).await;

        let removed = sessions.sweep_expired();
        if removed > 0 {
            tracing::info!(count = removed, remaining = sessions.len(), "swept idle call sessions");
        }
    }
}
