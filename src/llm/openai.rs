//! OpenAI-compatible chat completions client with image input.
//!
//! Thin HTTP wrapper for `/chat/completions` and `/models`. Pure request
//! building and response parsing live in free functions for testability.

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::config::LlmTimeouts;
use super::types::{CanvasImage, LlmError};

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(api_key: String, base_url: &str, timeouts: LlmTimeouts) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| LlmError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, api_key, base_url: base_url.trim_end_matches('/').to_string() })
    }

    /// Send one system + user(text, image) exchange and return the answer text.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-200 status, or an
    /// unparsable body.
    pub async fn describe(
        &self,
        model: &str,
        max_tokens: u32,
        system: &str,
        prompt: &str,
        image: &CanvasImage,
    ) -> Result<String, LlmError> {
        let image_url = image.to_data_url();
        let body = build_request(model, max_tokens, system, prompt, &image_url);
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;
        if status != 200 {
            return Err(LlmError::ApiResponse { status, body: text });
        }
        parse_response(&text)
    }

    /// List models as a connectivity and credential check.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or non-200 status.
    pub async fn check_health(&self) -> Result<(), LlmError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;
        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiResponse { status, body });
        }
        Ok(())
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
pub(crate) struct CcRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    messages: Vec<CcMessage<'a>>,
}

#[derive(Serialize)]
struct CcMessage<'a> {
    role: &'static str,
    content: CcContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum CcContent<'a> {
    Text(&'a str),
    Parts(Vec<CcPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CcPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: CcImageUrl<'a> },
}

#[derive(Serialize)]
struct CcImageUrl<'a> {
    url: &'a str,
    detail: &'static str,
}

pub(crate) fn build_request<'a>(
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    prompt: &'a str,
    image_url: &'a str,
) -> CcRequest<'a> {
    CcRequest {
        model,
        max_tokens,
        temperature: 0.0,
        top_p: 0.1,
        messages: vec![
            CcMessage { role: "system", content: CcContent::Text(system) },
            CcMessage {
                role: "user",
                content: CcContent::Parts(vec![
                    CcPart::Text { text: prompt },
                    CcPart::ImageUrl { image_url: CcImageUrl { url: image_url, detail: "high" } },
                ]),
            },
        ],
    }
}

// =============================================================================
// RESPONSE PARSING
// =============================================================================

pub(crate) fn parse_response(json_text: &str) -> Result<String, LlmError> {
    let root: Value = serde_json::from_str(json_text).map_err(|e| LlmError::ApiParse(e.to_string()))?;
    let Some(choice) = root
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
    else {
        return Err(LlmError::ApiParse("chat_completions: missing choices[0]".to_string()));
    };
    let text = choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .unwrap_or("");
    Ok(text.to_string())
}

#[cfg(test)]
#[path = "openai_test.rs"]
mod tests;
