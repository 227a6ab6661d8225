//! Wire messages — the JSON envelope exchanged over the collaboration socket.
//!
//! DESIGN
//! ======
//! Every message is `{type, clientId, payload}`. Inbound messages are parsed
//! only as far as the envelope; the hub decodes `payload` per kind. Outbound
//! server messages are serialized once and shared as `Arc<str>` so fan-out
//! never re-encodes per recipient.
//!
//! Relayed client messages are forwarded verbatim: the original text keeps
//! its `clientId`, which lets recipients suppress echoes of their own actions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::services::action_log::Action;

// =============================================================================
// CONSTANTS
// =============================================================================

/// `clientId` stamped on server-originated messages.
pub const SERVER_ID: &str = "server";

pub const KIND_DRAW: &str = "draw";
pub const KIND_TEXT: &str = "text";
pub const KIND_CLEAR: &str = "clear";
pub const KIND_CURSOR: &str = "cursor";
pub const KIND_USER_COUNT: &str = "user_count";
pub const KIND_BOARD_STATE: &str = "board_state";
pub const KIND_ERROR: &str = "error";

// =============================================================================
// TYPES
// =============================================================================

/// Serialized outbound message, shared between recipients.
pub type Outbound = Arc<str>;

/// Inbound envelope. `payload` stays raw until the kind is known.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(rename = "clientId")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

/// Message kinds the hub understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Draw,
    Text,
    Clear,
    Cursor,
    /// Server-only or unrecognized kind; ignored on ingress.
    Other,
}

impl MessageKind {
    #[must_use]
    pub fn parse(kind: &str) -> Self {
        match kind {
            KIND_DRAW => Self::Draw,
            KIND_TEXT => Self::Text,
            KIND_CLEAR => Self::Clear,
            KIND_CURSOR => Self::Cursor,
            _ => Self::Other,
        }
    }
}

#[derive(Serialize)]
struct ServerMessage<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    #[serde(rename = "clientId")]
    client_id: &'a str,
    payload: Value,
}

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured error messages.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

fn server_message(kind: &str, payload: Value) -> Outbound {
    let msg = ServerMessage { kind, client_id: SERVER_ID, payload };
    // Serializing a `Value` tree with string keys cannot fail.
    serde_json::to_string(&msg)
        .unwrap_or_default()
        .into()
}

/// `user_count` broadcast with the current number of live connections.
#[must_use]
pub fn user_count(count: usize) -> Outbound {
    server_message(KIND_USER_COUNT, json!({ "count": count }))
}

/// `board_state` snapshot for a newly joined connection.
#[must_use]
pub fn board_state(actions: &[Action]) -> Outbound {
    let actions = serde_json::to_value(actions).unwrap_or_else(|_| json!([]));
    server_message(KIND_BOARD_STATE, json!({ "actions": actions }))
}

/// Error message for the sender only.
#[must_use]
pub fn error(message: impl Into<String>, code: &str, retryable: bool) -> Outbound {
    server_message(
        KIND_ERROR,
        json!({ "message": message.into(), "code": code, "retryable": retryable }),
    )
}

/// Error message built from a typed error.
#[must_use]
pub fn error_from(err: &(impl ErrorCode + ?Sized)) -> Outbound {
    error(err.to_string(), err.error_code(), err.retryable())
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
