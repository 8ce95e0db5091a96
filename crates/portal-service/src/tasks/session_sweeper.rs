//! Session sweeper background task.
//!
//! Expired sessions already read as `NotFound`; the sweeper reclaims their
//! memory. It only runs when `SESSION_TTL_SECONDS` is set.
//!
//! # Graceful Shutdown
//!
//! The task exits when the cancellation token is cancelled. A sweep in
//! progress completes first.

use crate::session::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Upper bound on the time between sweeps.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Lower bound so a tiny TTL cannot spin the task.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Sweep at least once per TTL, and at least once a minute.
pub fn sweep_interval_for_ttl(ttl: Duration) -> Duration {
    ttl.clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL)
}

/// Start the session sweeper.
///
/// Returns when the cancellation token is triggered.
#[instrument(skip_all, name = "portal.task.session_sweeper")]
pub async fn start_session_sweeper(
    sessions: Arc<dyn SessionStore>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "portal.task.session_sweeper",
        interval_seconds = interval.as_secs(),
        "Starting session sweeper"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_sweep(sessions.as_ref()).await;
            }
            _ = cancel_token.cancelled() => {
                info!(
                    target: "portal.task.session_sweeper",
                    "Session sweeper received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "portal.task.session_sweeper", "Session sweeper stopped");
}

/// Run a single sweep.
pub(crate) async fn run_sweep(sessions: &dyn SessionStore) {
    match sessions.purge_expired().await {
        Ok(0) => {}
        Ok(count) => {
            info!(
                target: "portal.task.session_sweeper",
                purged = count,
                "Purged expired sessions"
            );
        }
        Err(e) => {
            tracing::error!(
                target: "portal.task.session_sweeper",
                error = %e,
                "Failed to purge expired sessions"
            );
        }
    }
}
