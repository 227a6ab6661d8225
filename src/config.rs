//! Process configuration parsed from environment variables.
//!
//! Every field has a default. Numeric values that fail to parse fall back to
//! their default rather than aborting start-up; an unparsable bind address is
//! the only hard error.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub const APP_NAME: &str = "FastBoard";
pub const APP_DESCRIPTION: &str = "Real-time collaborative whiteboard";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_STATIC_DIR: &str = "static";

pub const DEFAULT_WS_CHANNEL_CAPACITY: usize = 256;
pub const DEFAULT_WS_PING_INTERVAL_SECS: u64 = 20;
pub const DEFAULT_INACTIVE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_CURSOR_TTL_MS: u64 = 3000;

pub const DEFAULT_MAX_STROKE_POINTS: usize = 1000;
pub const DEFAULT_MAX_BRUSH_SIZE: u32 = 100;
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 1000;
pub const DEFAULT_MAX_COORDINATE: f64 = 10_000.0;

pub const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 100;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_RATE_LIMIT_EVICT_WINDOWS: u32 = 2;
pub const DEFAULT_RATE_LIMIT_MAX_KEYS: usize = 10_000;

pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid bind address {host}:{port}")]
    InvalidBindAddress { host: String, port: u16 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub static_dir: PathBuf,

    pub ws_channel_capacity: usize,
    pub ws_ping_interval_secs: u64,
    /// 0 disables inactivity reaping.
    pub inactive_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub cursor_ttl_ms: u64,

    pub max_stroke_points: usize,
    pub max_brush_size: u32,
    pub max_text_length: usize,
    pub max_coordinate: f64,

    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_evict_windows: u32,
    pub rate_limit_max_keys: usize,

    pub ai_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            log_level: DEFAULT_LOG_LEVEL.into(),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            ws_channel_capacity: DEFAULT_WS_CHANNEL_CAPACITY,
            ws_ping_interval_secs: DEFAULT_WS_PING_INTERVAL_SECS,
            inactive_timeout_secs: DEFAULT_INACTIVE_TIMEOUT_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            cursor_ttl_ms: DEFAULT_CURSOR_TTL_MS,
            max_stroke_points: DEFAULT_MAX_STROKE_POINTS,
            max_brush_size: DEFAULT_MAX_BRUSH_SIZE,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            max_coordinate: DEFAULT_MAX_COORDINATE,
            rate_limit_requests: DEFAULT_RATE_LIMIT_REQUESTS,
            rate_limit_window_secs: DEFAULT_RATE_LIMIT_WINDOW_SECS,
            rate_limit_evict_windows: DEFAULT_RATE_LIMIT_EVICT_WINDOWS,
            rate_limit_max_keys: DEFAULT_RATE_LIMIT_MAX_KEYS,
            ai_timeout_secs: DEFAULT_AI_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    /// Build config from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let parse = |key: &str| lookup(key).map(|v| v.trim().to_string());

        Self {
            host: parse("HOST").filter(|v| !v.is_empty()).unwrap_or(d.host),
            port: parse_or(parse("PORT"), d.port),
            log_level: parse("LOG_LEVEL")
                .filter(|v| !v.is_empty())
                .map_or(d.log_level, |v| v.to_lowercase()),
            static_dir: parse("STATIC_DIR").map_or(d.static_dir, PathBuf::from),
            ws_channel_capacity: parse_or(parse("WS_CHANNEL_CAPACITY"), d.ws_channel_capacity).max(1),
            ws_ping_interval_secs: parse_or(parse("WS_PING_INTERVAL_SECS"), d.ws_ping_interval_secs).max(1),
            inactive_timeout_secs: parse_or(parse("INACTIVE_TIMEOUT_SECS"), d.inactive_timeout_secs),
            sweep_interval_secs: parse_or(parse("SWEEP_INTERVAL_SECS"), d.sweep_interval_secs).max(1),
            cursor_ttl_ms: parse_or(parse("CURSOR_TTL_MS"), d.cursor_ttl_ms),
            max_stroke_points: parse_or(parse("MAX_STROKE_POINTS"), d.max_stroke_points),
            max_brush_size: parse_or(parse("MAX_BRUSH_SIZE"), d.max_brush_size),
            max_text_length: parse_or(parse("MAX_TEXT_LENGTH"), d.max_text_length),
            max_coordinate: parse_or(parse("MAX_COORDINATE"), d.max_coordinate),
            rate_limit_requests: parse_or(parse("RATE_LIMIT_REQUESTS"), d.rate_limit_requests),
            rate_limit_window_secs: parse_or(parse("RATE_LIMIT_WINDOW_SECS"), d.rate_limit_window_secs).max(1),
            rate_limit_evict_windows: parse_or(parse("RATE_LIMIT_EVICT_WINDOWS"), d.rate_limit_evict_windows),
            rate_limit_max_keys: parse_or(parse("RATE_LIMIT_MAX_KEYS"), d.rate_limit_max_keys).max(1),
            ai_timeout_secs: parse_or(parse("AI_TIMEOUT_SECS"), d.ai_timeout_secs).max(1),
        }
    }

    /// Socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBindAddress` if `host` is not an IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress { host: self.host.clone(), port: self.port })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    #[must_use]
    pub fn cursor_ttl(&self) -> Duration {
        Duration::from_millis(self.cursor_ttl_ms)
    }

    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ws_ping_interval_secs)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    #[must_use]
    pub fn inactive_timeout(&self) -> Option<Duration> {
        (self.inactive_timeout_secs > 0).then(|| Duration::from_secs(self.inactive_timeout_secs))
    }

    #[must_use]
    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.parse::<T>().ok()).unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
