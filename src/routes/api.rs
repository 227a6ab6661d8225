//! REST endpoints: AI assist, health, app info, and websocket stats.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;

use crate::config::{APP_DESCRIPTION, APP_NAME};
use crate::services::ai::{self, AiError};
use crate::services::hub::HubStats;
use crate::state::AppState;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
pub struct AiAssistRequest {
    pub image_data: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiAssistResponse {
    pub success: bool,
    pub interpretation: Option<String>,
    pub error: Option<String>,
}

/// `POST /api/v1/ai-assist`
pub async fn ai_assist(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<AiAssistRequest>,
) -> Response {
    let key = super::client_ip(&headers, peer);
    let result = ai::interpret_canvas(
        state.interpreter.as_ref(),
        &state.rate_limiter,
        &key,
        &body.image_data,
        state.config.ai_timeout(),
    )
    .await;

    match result {
        Ok(text) => {
            Json(AiAssistResponse { success: true, interpretation: Some(text), error: None }).into_response()
        }
        Err(e) => {
            let status = match &e {
                AiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
                AiError::InvalidImage(_) => StatusCode::BAD_REQUEST,
                AiError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                AiError::Timeout(_) | AiError::Upstream(_) => StatusCode::OK,
            };
            let failure = AiAssistResponse { success: false, interpretation: None, error: Some(e.public_message()) };
            let mut response = (status, Json(failure)).into_response();
            if let AiError::RateLimited(limit) = &e {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(limit.retry_after_secs()));
            }
            response
        }
    }
}

/// `GET /api/v1/health`
pub async fn health(State(state): State<AppState>) -> Response {
    let (available, healthy) = match &state.interpreter {
        Some(interpreter) => (true, ai::interpreter_healthy(interpreter, HEALTH_CHECK_TIMEOUT).await),
        None => (false, false),
    };
    let ok = healthy || !available;
    let body = json!({
        "status": if ok { "healthy" } else { "degraded" },
        "service": APP_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": unix_now(),
        "ai_service": { "available": available, "healthy": healthy },
    });
    let status = if ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(body)).into_response()
}

/// `GET /api/v1/info`
pub async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = &state.config;
    let limiter = state.rate_limiter.config();
    Json(json!({
        "name": APP_NAME,
        "description": APP_DESCRIPTION,
        "version": env!("CARGO_PKG_VERSION"),
        "features": {
            "ai_assist": state.interpreter.is_some(),
            "real_time_collaboration": true,
            "canvas_drawing": true,
        },
        "limits": {
            "max_stroke_points": config.max_stroke_points,
            "max_brush_size": config.max_brush_size,
            "max_text_length": config.max_text_length,
            "ai_rate_limit": format!("{} requests per {} seconds", limiter.max_requests, limiter.window.as_secs()),
        },
    }))
}

/// `GET /ws/stats`
pub async fn ws_stats(State(state): State<AppState>) -> Json<HubStats> {
    Json(state.hub.stats())
}

fn unix_now() -> f64 {
    (OffsetDateTime::now_utc() - OffsetDateTime::UNIX_EPOCH).as_seconds_f64()
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
