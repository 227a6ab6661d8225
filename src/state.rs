//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the single board's broadcast hub, the AI rate limiter, the
//! optional canvas interpreter, and the shutdown signal every connection
//! task watches.

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::AppConfig;
use crate::llm::CanvasInterpreter;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::services::hub::BroadcastHub;
use crate::services::payload::PayloadLimits;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub hub: Arc<BroadcastHub>,
    /// In-memory rate limiter for AI requests.
    pub rate_limiter: RateLimiter,
    /// Optional interpreter. `None` if LLM env vars are not configured.
    pub interpreter: Option<Arc<dyn CanvasInterpreter>>,
    /// Flipped to `true` once on SIGINT/SIGTERM.
    pub shutdown: Arc<watch::Sender<bool>>,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, interpreter: Option<Arc<dyn CanvasInterpreter>>) -> Self {
        let hub = BroadcastHub::new(
            config.ws_channel_capacity,
            config.cursor_ttl(),
            PayloadLimits::from_config(&config),
        );
        let rate_limiter = RateLimiter::new(RateLimitConfig::from_app(&config));
        let (shutdown, _) = watch::channel(false);
        Self {
            config: Arc::new(config),
            hub: Arc::new(hub),
            rate_limiter,
            interpreter,
            shutdown: Arc::new(shutdown),
        }
    }

    /// Tell every connection task to close.
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
