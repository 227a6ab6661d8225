//! AI assist — canvas snapshot → rate limit → interpreter → text.
//!
//! DESIGN
//! ======
//! Receives a data URL from the HTTP route, charges one request against the
//! caller's rate-limit key, decodes the image, and asks the configured
//! [`CanvasInterpreter`] for a description under a hard timeout.
//!
//! Upstream failures are logged with their cause and surfaced to callers only
//! through [`AiError::public_message`], which never carries provider detail.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::llm::{CanvasImage, CanvasInterpreter, ImageError, LlmError};
use crate::message::ErrorCode;
use crate::rate_limit::{RateLimitError, RateLimiter};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("rate limited: {0}")]
    RateLimited(#[from] RateLimitError),
    #[error("AI service not configured")]
    NotConfigured,
    #[error("invalid image: {0}")]
    InvalidImage(#[from] ImageError),
    #[error("AI request timed out after {0:?}")]
    Timeout(Duration),
    #[error("upstream error: {0}")]
    Upstream(#[from] LlmError),
}

impl ErrorCode for AiError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::RateLimited(_) => "E_RATE_LIMITED",
            Self::NotConfigured => "E_AI_NOT_CONFIGURED",
            Self::InvalidImage(_) => "E_INVALID_IMAGE",
            Self::Timeout(_) => "E_AI_TIMEOUT",
            Self::Upstream(_) => "E_UPSTREAM_UNAVAILABLE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Timeout(_))
            || matches!(self, Self::Upstream(e) if e.retryable())
    }
}

impl AiError {
    /// Text safe to show the requesting client.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::RateLimited(_) => "Rate limit exceeded. Please try again later.".into(),
            Self::NotConfigured => "AI service is currently unavailable. Please check configuration.".into(),
            Self::InvalidImage(e) => format!("Invalid image data: {e}"),
            Self::Timeout(_) => "AI request timed out. Please try again.".into(),
            Self::Upstream(_) => "AI interpretation failed. Please try again later.".into(),
        }
    }
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Interpret one canvas snapshot on behalf of `key`.
///
/// # Errors
///
/// In check order: `RateLimited` once `key` has spent its window,
/// `NotConfigured` without an interpreter, `InvalidImage` for a bad data URL,
/// `Timeout` when the interpreter exceeds `timeout`, and `Upstream` for any
/// interpreter failure.
pub async fn interpret_canvas(
    interpreter: Option<&Arc<dyn CanvasInterpreter>>,
    limiter: &RateLimiter,
    key: &str,
    image_data: &str,
    timeout: Duration,
) -> Result<String, AiError> {
    if let Err(e) = limiter.check(key) {
        warn!(key, retry_after_secs = e.retry_after_secs(), "ai: rate limit exceeded");
        return Err(e.into());
    }
    let Some(interpreter) = interpreter else {
        warn!(key, "ai: assist requested but no interpreter is configured");
        return Err(AiError::NotConfigured);
    };
    let image = CanvasImage::from_data_url(image_data)?;
    info!(key, media_type = %image.media_type, bytes = image.bytes.len(), "ai: interpreting canvas");

    match tokio::time::timeout(timeout, interpreter.interpret(&image)).await {
        Ok(Ok(text)) => {
            info!(key, chars = text.chars().count(), "ai: interpretation complete");
            Ok(text)
        }
        Ok(Err(e)) => {
            error!(key, error = %e, "ai: interpreter failed");
            Err(AiError::Upstream(e))
        }
        Err(_) => {
            error!(key, timeout_secs = timeout.as_secs(), "ai: interpreter timed out");
            Err(AiError::Timeout(timeout))
        }
    }
}

/// Check the interpreter, bounded by `timeout`. `false` on error or timeout.
pub async fn interpreter_healthy(interpreter: &Arc<dyn CanvasInterpreter>, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, interpreter.health()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(error = %e, "ai: health check failed");
            false
        }
        Err(_) => {
            warn!("ai: health check timed out");
            false
        }
    }
}

#[cfg(test)]
#[path = "ai_test.rs"]
mod tests;
