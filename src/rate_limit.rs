//! In-memory rate limiting for AI requests.
//!
//! DESIGN
//! ======
//! Fixed-window counters keyed by caller identity (client IP, or client id).
//! Each key owns `{window_start, count}`; the window resets once `now` passes
//! `window_start + window`. Requests beyond `max_requests` inside one window
//! are refused for the remainder of that window.
//!
//! Keys that stop requesting are reclaimed: an entry whose window ended more
//! than `evict_after_windows` windows ago is dropped by `evict_stale`, which
//! the sweeper calls periodically and `check` calls inline once the map
//! reaches `max_keys`. `max_keys` is a hard cap: if nothing is stale, the
//! key with the oldest window gives way to the new one.
//!
//! Only the AI-assist path is gated here. Drawing and broadcast never are.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::AppConfig;

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
    pub evict_after_windows: u32,
    pub max_keys: usize,
}

impl RateLimitConfig {
    #[must_use]
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            max_requests: config.rate_limit_requests,
            window: Duration::from_secs(config.rate_limit_window_secs),
            evict_after_windows: config.rate_limit_evict_windows,
            max_keys: config.rate_limit_max_keys,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { max_requests: 100, window: Duration::from_secs(60), evict_after_windows: 2, max_keys: 10_000 }
    }
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("rate limit exceeded (max {limit} requests/{window_secs}s)")]
    Exceeded { limit: u32, window_secs: u64, retry_after_secs: u64 },
}

impl RateLimitError {
    #[must_use]
    pub fn retry_after_secs(&self) -> u64 {
        match self {
            Self::Exceeded { retry_after_secs, .. } => *retry_after_secs,
        }
    }
}

impl crate::message::ErrorCode for RateLimitError {
    fn error_code(&self) -> &'static str {
        "E_RATE_LIMITED"
    }

    fn retryable(&self) -> bool {
        true
    }
}

// =============================================================================
// RATE LIMITER
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    window_start: Instant,
    count: u32,
}

#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<String, RateLimitWindow>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self { windows: Arc::new(Mutex::new(HashMap::new())), config }
    }

    #[must_use]
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Count one request for `key`; `false` once the window's budget is spent.
    #[cfg(test)]
    pub(crate) fn allow(&self, key: &str) -> bool {
        self.check(key).is_ok()
    }

    /// Count one request for `key`.
    ///
    /// # Errors
    ///
    /// Returns `Exceeded` when `key` has used up its window.
    pub fn check(&self, key: &str) -> Result<(), RateLimitError> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), RateLimitError> {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let cfg = self.config;

        if windows.len() >= cfg.max_keys && !windows.contains_key(key) {
            evict(&mut windows, now, cfg);
            if windows.len() >= cfg.max_keys {
                evict_oldest(&mut windows);
            }
        }

        let entry = windows
            .entry(key.to_string())
            .or_insert(RateLimitWindow { window_start: now, count: 0 });
        if now.saturating_duration_since(entry.window_start) >= cfg.window {
            *entry = RateLimitWindow { window_start: now, count: 0 };
        }

        entry.count = entry.count.saturating_add(1);
        if entry.count > cfg.max_requests {
            let elapsed = now.saturating_duration_since(entry.window_start);
            let remaining = cfg.window.saturating_sub(elapsed);
            return Err(RateLimitError::Exceeded {
                limit: cfg.max_requests,
                window_secs: cfg.window.as_secs(),
                retry_after_secs: remaining.as_secs().max(1),
            });
        }
        Ok(())
    }

    /// Drop entries whose window ended more than `evict_after_windows` ago.
    /// Returns how many were dropped.
    pub fn evict_stale(&self) -> usize {
        self.evict_stale_at(Instant::now())
    }

    fn evict_stale_at(&self, now: Instant) -> usize {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        evict(&mut windows, now, self.config)
    }

    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn evict(windows: &mut HashMap<String, RateLimitWindow>, now: Instant, cfg: RateLimitConfig) -> usize {
    let grace = cfg.window.saturating_mul(cfg.evict_after_windows);
    let before = windows.len();
    windows.retain(|_, w| {
        let window_end = w.window_start + cfg.window;
        now.saturating_duration_since(window_end) <= grace
    });
    let evicted = before - windows.len();
    if evicted > 0 {
        debug!(evicted, remaining = windows.len(), "rate limit: evicted stale windows");
    }
    evicted
}

fn evict_oldest(windows: &mut HashMap<String, RateLimitWindow>) {
    let oldest = windows
        .iter()
        .min_by_key(|(_, w)| w.window_start)
        .map(|(k, _)| k.clone());
    if let Some(key) = oldest {
        windows.remove(&key);
        debug!(key = %key, "rate limit: key cap reached, evicted oldest window");
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
