//! LLM types — provider-neutral image input, errors, and the interpreter trait.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by LLM client operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// The required API key environment variable is not set.
    #[error("missing API key: env var {var} not set")]
    MissingApiKey { var: String },

    /// The HTTP request to the LLM provider failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The LLM provider returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// The LLM provider response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// The provider answered, but with no usable text.
    #[error("empty or truncated response: {0}")]
    EmptyResponse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl crate::message::ErrorCode for LlmError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::MissingApiKey { .. } => "E_MISSING_API_KEY",
            Self::ApiRequest(_) => "E_API_REQUEST",
            Self::ApiResponse { .. } => "E_API_RESPONSE",
            Self::ApiParse(_) => "E_API_PARSE",
            Self::EmptyResponse(_) => "E_EMPTY_RESPONSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::ApiRequest(_) | Self::ApiResponse { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// IMAGE INPUT
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("image data must be a data:image/ URL")]
    NotImageDataUrl,
    #[error("image data URL must be base64 encoded")]
    NotBase64,
    #[error("image data is empty")]
    Empty,
    #[error("image data is not valid base64: {0}")]
    Decode(String),
}

/// A canvas snapshot decoded from a `data:image/...;base64,...` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasImage {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl CanvasImage {
    /// Decode a browser `canvas.toDataURL()` string.
    ///
    /// # Errors
    ///
    /// Returns an `ImageError` when the URL is not a base64 image data URL.
    pub fn from_data_url(url: &str) -> Result<Self, ImageError> {
        let rest = url
            .strip_prefix("data:")
            .filter(|r| r.starts_with("image/"))
            .ok_or(ImageError::NotImageDataUrl)?;
        let (meta, data) = rest.split_once(',').ok_or(ImageError::NotBase64)?;
        let media_type = meta
            .strip_suffix(";base64")
            .ok_or(ImageError::NotBase64)?;
        if data.is_empty() {
            return Err(ImageError::Empty);
        }
        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| ImageError::Decode(e.to_string()))?;
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        Ok(Self { media_type: media_type.to_string(), bytes })
    }

    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.to_base64())
    }
}

// =============================================================================
// INTERPRETER TRAIT
// =============================================================================

/// Turns a canvas snapshot into descriptive text. Enables mocking in tests.
#[async_trait::async_trait]
pub trait CanvasInterpreter: Send + Sync {
    /// Describe what is drawn on the canvas.
    ///
    /// # Errors
    ///
    /// Returns an [`LlmError`] if the request fails or the answer is unusable.
    async fn interpret(&self, image: &CanvasImage) -> Result<String, LlmError>;

    /// Cheap connectivity check for health reporting.
    ///
    /// # Errors
    ///
    /// Returns an [`LlmError`] if the provider cannot be reached.
    async fn health(&self) -> Result<(), LlmError>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
