//! Sweeper — periodic housekeeping for ephemeral state.
//!
//! DESIGN
//! ======
//! One background task ticks every `SWEEP_INTERVAL_SECS` and:
//!
//! - expires cursor positions older than the presence TTL
//! - evicts rate-limit windows that have been idle for several windows
//! - disconnects connections with no activity for `INACTIVE_TIMEOUT_SECS`
//!
//! Each pass is synchronous and holds no lock across an await.

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::state::AppState;

/// What one sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub cursors_expired: usize,
    pub windows_evicted: usize,
    pub connections_reaped: usize,
}

/// Run one housekeeping pass.
pub fn sweep_once(state: &AppState) -> SweepReport {
    let hub = &state.hub;
    let report = SweepReport {
        cursors_expired: hub.presence().expire_older_than(hub.presence().ttl()).len(),
        windows_evicted: state.rate_limiter.evict_stale(),
        connections_reaped: state
            .config
            .inactive_timeout()
            .map_or(0, |timeout| hub.reap_inactive(timeout)),
    };
    if report != SweepReport::default() {
        debug!(
            cursors_expired = report.cursors_expired,
            windows_evicted = report.windows_evicted,
            connections_reaped = report.connections_reaped,
            tracked_keys = state.rate_limiter.tracked_keys(),
            "sweeper: pass complete"
        );
    }
    report
}

/// Spawn the periodic sweeper. Abort the handle to stop it.
#[must_use]
pub fn spawn_sweeper(state: AppState) -> JoinHandle<()> {
    let interval = state.config.sweep_interval();
    info!(interval_secs = interval.as_secs(), "sweeper configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            sweep_once(&state);
        }
    })
}

#[cfg(test)]
#[path = "sweeper_test.rs"]
mod tests;
