//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the websocket endpoints, the versioned REST API, and the
//! static front-end under a single Axum router. Unmatched paths fall through
//! to `STATIC_DIR`, so `/` serves its `index.html`.

pub mod api;
pub mod ws;

use std::net::SocketAddr;

use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// API + websocket routes, without the static fallback.
fn api_routes(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws::handle_ws))
        .route("/ws/stats", get(api::ws_stats))
        .route("/ws/{client_id}", get(ws::handle_ws_with_id))
        .route("/api/v1/ai-assist", post(api::ai_assist))
        .route("/api/v1/health", get(api::health))
        .route("/api/v1/info", get(api::info))
        .route("/healthz", get(healthz))
        .layer(cors)
        .with_state(state)
}

/// Full application router: API routes plus static assets at `/`.
pub fn app(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();
    let static_service = ServeDir::new(static_dir).append_index_html_on_directories(true);

    api_routes(state)
        .fallback_service(static_service)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Best-effort caller address: first `X-Forwarded-For` hop, then
/// `X-Real-IP`, then the socket peer.
pub(crate) fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    header("x-forwarded-for")
        .or_else(|| header("x-real-ip"))
        .unwrap_or_else(|| peer.ip().to_string())
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
