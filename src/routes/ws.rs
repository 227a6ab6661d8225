//! WebSocket handler — one task per connection relaying board messages.
//!
//! DESIGN
//! ======
//! On upgrade, the connection is admitted to the hub (which queues its
//! `board_state`) and the task enters a `select!` loop:
//! - Incoming client text → `BroadcastHub::handle_inbound`
//! - Outbound queue → forward to the socket
//! - Ping tick → keep-alive ping
//! - Shutdown signal → close frame, then leave
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → admit (duplicate id: `error` + close) → `board_state` first
//! 2. Client text → hub validates, logs, relays; errors go back to the sender
//! 3. Socket close, queue closed by the hub, send failure, or shutdown →
//!    leave the loop
//! 4. Teardown runs from a drop guard, so it also runs if the task is
//!    cancelled mid-await

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use time::OffsetDateTime;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::message;
use crate::services::registry::ConnectionHandle;
use crate::state::AppState;
use crate::utils::scope_guard::ScopeGuard;

const MAX_CLIENT_ID_LEN: usize = 128;

// =============================================================================
// UPGRADE
// =============================================================================

/// `GET /ws` — the server assigns the identity.
pub async fn handle_ws(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let ip = super::client_ip(&headers, peer);
    let client_id = generate_client_id();
    ws.on_upgrade(move |socket| run_ws(socket, state, client_id, ip))
}

/// `GET /ws/{client_id}` — the client supplies its identity.
pub async fn handle_ws_with_id(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let client_id = client_id.trim().to_string();
    if client_id.is_empty() || client_id.len() > MAX_CLIENT_ID_LEN || client_id == message::SERVER_ID {
        return (StatusCode::BAD_REQUEST, "invalid client id").into_response();
    }
    let ip = super::client_ip(&headers, peer);
    ws.on_upgrade(move |socket| run_ws(socket, state, client_id, ip))
}

/// `client_<unix-ms>_<8 hex>`.
pub(crate) fn generate_client_id() -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let suffix = Uuid::new_v4().simple().to_string();
    format!("client_{millis}_{}", &suffix[..8])
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, client_id: String, ip: String) {
    let ConnectionHandle { id, token, mut rx } = match state.hub.on_connect(&client_id, Some(ip)) {
        Ok(handle) => handle,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: admission rejected");
            let _ = socket
                .send(Message::Text(message::error_from(&e).as_ref().into()))
                .await;
            let _ = socket
                .send(Message::Close(Some(CloseFrame { code: close_code::POLICY, reason: "duplicate identity".into() })))
                .await;
            return;
        }
    };

    let _teardown = {
        let hub = state.hub.clone();
        let id = id.clone();
        ScopeGuard::new(move || hub.on_disconnect(&id, token))
    };
    info!(client_id = %id, "ws: client connected");

    let period = state.config.ping_interval();
    let mut ping = tokio::time::interval_at(Instant::now() + period, period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut shutdown = state.shutdown.subscribe();
    let mut closing = *shutdown.borrow_and_update();

    while !closing {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        if let Err(e) = state.hub.handle_inbound(&id, text.as_str()) {
                            warn!(client_id = %id, error = %e, "ws: rejected inbound message");
                            state.hub.send_to(&id, &message::error_from(&e));
                        }
                    }
                    Message::Pong(_) | Message::Ping(_) => state.hub.registry().touch(&id),
                    Message::Close(_) => break,
                    Message::Binary(_) => debug!(client_id = %id, "ws: ignoring binary message"),
                }
            }
            out = rx.recv() => {
                let Some(out) = out else {
                    debug!(client_id = %id, "ws: outbound queue closed by hub");
                    break;
                };
                if socket.send(Message::Text(out.as_ref().into())).await.is_err() {
                    break;
                }
            }
            _ = ping.tick() => {
                if socket.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
            changed = shutdown.changed() => {
                closing = changed.is_err() || *shutdown.borrow();
            }
        }
    }

    if closing {
        let _ = socket
            .send(Message::Close(Some(CloseFrame { code: close_code::AWAY, reason: "server shutting down".into() })))
            .await;
    }
    info!(client_id = %id, "ws: client disconnected");
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
