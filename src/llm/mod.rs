//! LLM — multi-provider adapter for canvas interpretation.
//!
//! DESIGN
//! ======
//! Uses environment variables for configuration. The `LlmClient` dispatches
//! to Anthropic or `OpenAI` based on `LLM_PROVIDER` and implements
//! [`CanvasInterpreter`], which is the only surface the rest of the server
//! sees.

pub mod anthropic;
pub mod config;
pub mod openai;
pub mod types;

use config::{LlmConfig, LlmProviderKind};
pub use types::{CanvasImage, CanvasInterpreter, ImageError, LlmError};

/// Answers shorter than this are treated as truncated.
pub const MIN_INTERPRETATION_CHARS: usize = 10;

const SYSTEM_PROMPT: &str = "You are a precise image analyzer. Only describe what you actually see in the \
image. Do not make assumptions or create content that isn't clearly visible.";

const INTERPRET_PROMPT: &str = "\
You are analyzing a hand-drawn image from a digital whiteboard. Respond only from what is visible.

First identify the content type: plain text or notes, a list, mathematical expressions, a flowchart \
(boxes connected by arrows), a mind map or hierarchy, a drawing, a table, or empty/unclear.

Then answer in the matching format:
- text or words: plain text
- a list: Markdown bullet points
- math: LaTeX
- boxes connected by arrows: a Mermaid flowchart
- a hierarchy or mind map: nested Markdown
- a drawing: a short description in words
- a table: a Markdown table
- empty or unclear: say so

Do not produce a Mermaid flowchart unless boxes and arrows are actually drawn. Do not invent content.";

// =============================================================================
// CLIENT DISPATCH
// =============================================================================

/// Concrete LLM client that dispatches to either Anthropic or `OpenAI`.
pub struct LlmClient {
    inner: LlmProvider,
    model: String,
    max_tokens: u32,
}

enum LlmProvider {
    Anthropic(anthropic::AnthropicClient),
    OpenAi(openai::OpenAiClient),
}

impl LlmClient {
    /// Build an LLM client from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or the HTTP client fails.
    pub fn from_env() -> Result<Self, LlmError> {
        Self::from_config(LlmConfig::from_env()?)
    }

    /// Build an LLM client from a parsed typed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider HTTP client fails to build.
    pub fn from_config(config: LlmConfig) -> Result<Self, LlmError> {
        let inner = match config.provider {
            LlmProviderKind::Anthropic => LlmProvider::Anthropic(anthropic::AnthropicClient::new(
                config.api_key,
                &config.base_url,
                config.timeouts,
            )?),
            LlmProviderKind::OpenAi => {
                LlmProvider::OpenAi(openai::OpenAiClient::new(config.api_key, &config.base_url, config.timeouts)?)
            }
        };
        Ok(Self { inner, model: config.model, max_tokens: config.max_tokens })
    }

    /// Return the configured model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl CanvasInterpreter for LlmClient {
    async fn interpret(&self, image: &CanvasImage) -> Result<String, LlmError> {
        let raw = match &self.inner {
            LlmProvider::Anthropic(c) => {
                c.describe(&self.model, self.max_tokens, SYSTEM_PROMPT, INTERPRET_PROMPT, image)
                    .await?
            }
            LlmProvider::OpenAi(c) => {
                c.describe(&self.model, self.max_tokens, SYSTEM_PROMPT, INTERPRET_PROMPT, image)
                    .await?
            }
        };
        accept_interpretation(&raw)
    }

    async fn health(&self) -> Result<(), LlmError> {
        match &self.inner {
            LlmProvider::Anthropic(c) => c.check_health().await,
            LlmProvider::OpenAi(c) => c.check_health().await,
        }
    }
}

/// Trim the provider answer and reject empty or truncated ones.
///
/// # Errors
///
/// Returns `EmptyResponse` when fewer than [`MIN_INTERPRETATION_CHARS`]
/// characters remain after trimming.
pub fn accept_interpretation(raw: &str) -> Result<String, LlmError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(LlmError::EmptyResponse("no text in response".into()));
    }
    if text.chars().count() < MIN_INTERPRETATION_CHARS {
        return Err(LlmError::EmptyResponse(format!("response too short ({} chars)", text.chars().count())));
    }
    Ok(text.to_string())
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
