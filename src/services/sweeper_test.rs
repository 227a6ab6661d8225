use std::time::Duration;

use super::*;
use crate::state::test_helpers::{test_app_state, test_app_state_with};

#[test]
fn idle_state_sweeps_nothing() {
    let state = test_app_state();
    let _h = state.hub.on_connect("a", None).unwrap();
    state.hub.presence().update("a", 1.0, 2.0);
    assert_eq!(sweep_once(&state), SweepReport::default());
    assert_eq!(state.hub.presence().len(), 1);
}

#[test]
fn expires_stale_cursors() {
    let state = test_app_state_with(|c| c.cursor_ttl_ms = 20, None);
    state.hub.presence().update("a", 1.0, 2.0);
    std::thread::sleep(Duration::from_millis(60));
    state.hub.presence().update("b", 3.0, 4.0);

    let report = sweep_once(&state);
    assert_eq!(report.cursors_expired, 1);
    assert!(state.hub.presence().all().contains_key("b"));
}

#[test]
fn reaps_idle_connections_and_windows() {
    let state = test_app_state_with(
        |c| {
            c.inactive_timeout_secs = 1;
            c.rate_limit_window_secs = 1;
            c.rate_limit_evict_windows = 0;
        },
        None,
    );
    let _h = state.hub.on_connect("idle", None).unwrap();
    assert!(state.rate_limiter.allow("1.2.3.4"));
    std::thread::sleep(Duration::from_millis(1200));

    let report = sweep_once(&state);
    assert_eq!(report.connections_reaped, 1);
    assert_eq!(report.windows_evicted, 1);
    assert_eq!(state.hub.registry().count(), 0);
    assert_eq!(state.rate_limiter.tracked_keys(), 0);
}

#[test]
fn zero_inactive_timeout_disables_reaping() {
    let state = test_app_state_with(|c| c.inactive_timeout_secs = 0, None);
    let _h = state.hub.on_connect("a", None).unwrap();
    assert_eq!(sweep_once(&state).connections_reaped, 0);
    assert_eq!(state.hub.registry().count(), 1);
}

#[tokio::test]
async fn spawned_sweeper_runs_until_aborted() {
    let state = test_app_state_with(|c| c.cursor_ttl_ms = 20, None);
    state.hub.presence().update("a", 1.0, 2.0);
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The first tick fires immediately.
    let handle = spawn_sweeper(state.clone());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(state.hub.presence().is_empty());

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
}
