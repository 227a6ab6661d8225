//! Broadcast hub — ingress classification, state updates, and fan-out.
//!
//! DESIGN
//! ======
//! Every connection task feeds its inbound text into `handle_inbound`, which
//! runs synchronously under the hub's locks and never awaits. Per message
//! kind:
//!
//! - `draw` / `text` / `clear` → validate, append to the action log, relay
//!   the original text to every connection except the sender
//! - `cursor` → update presence, relay to every connection except the sender
//! - anything else → ignored
//!
//! Persistent actions are appended and fanned out while the action log lock
//! is held, and `on_connect` snapshots the log and admits the newcomer under
//! the same lock. A joiner therefore sees each action exactly once: in its
//! `board_state`, or live.
//!
//! FAILURES
//! ========
//! Malformed input is returned to the caller as `HubError` for the sender
//! alone. A recipient whose queue is closed or full is removed (implicit
//! disconnect) after the fan-out completes; the remaining recipients still
//! receive the message.
//!
//! ORDERING
//! ========
//! One sender's messages are handled in arrival order by its own task and
//! queued to each recipient in that order (per-sender FIFO). Nothing orders
//! messages across senders.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::message::{self, Envelope, MessageKind, Outbound};
use crate::services::action_log::{Action, ActionLog, LogStats};
use crate::services::payload::{self, PayloadLimits};
use crate::services::presence::{Position, PresenceTracker};
use crate::services::registry::{ClientId, ConnectionHandle, ConnectionInfo, ConnectionRegistry, DeliveryError, RegistryError};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HubError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl crate::message::ErrorCode for HubError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedPayload(_) => "E_MALFORMED_PAYLOAD",
        }
    }
}

/// What `handle_inbound` did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Appended to the log with this sequence number and relayed.
    Logged(u64),
    /// Relayed without persistence (cursor).
    Relayed,
    /// Unknown or server-only kind; dropped.
    Ignored,
}

/// Diagnostics snapshot for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    pub total_connections: usize,
    pub connections: Vec<ConnectionInfo>,
    pub log: LogStats,
    pub cursors: std::collections::HashMap<ClientId, Position>,
}

// =============================================================================
// HUB
// =============================================================================

pub struct BroadcastHub {
    registry: ConnectionRegistry,
    log: ActionLog,
    presence: PresenceTracker,
    limits: PayloadLimits,
}

impl BroadcastHub {
    #[must_use]
    pub fn new(queue_capacity: usize, cursor_ttl: Duration, limits: PayloadLimits) -> Self {
        Self {
            registry: ConnectionRegistry::new(queue_capacity),
            log: ActionLog::new(),
            presence: PresenceTracker::new(cursor_ttl),
            limits,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    #[cfg(test)]
    pub(crate) fn log(&self) -> &ActionLog {
        &self.log
    }

    #[must_use]
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    // -------------------------------------------------------------------------
    // LIFECYCLE
    // -------------------------------------------------------------------------

    /// Admit `id` with its `board_state` already queued as the first message,
    /// then broadcast the new `user_count` to everyone (newcomer included).
    ///
    /// # Errors
    ///
    /// Returns `DuplicateIdentity` if `id` is already connected.
    pub fn on_connect(&self, id: &str, ip_address: Option<String>) -> Result<ConnectionHandle, RegistryError> {
        let handle = self.log.snapshot_with(|actions| {
            let snapshot = message::board_state(&actions);
            self.registry.admit_with(id, ip_address, &snapshot)
        })?;
        debug!(client_id = %id, "hub: queued board_state");
        self.broadcast_user_count();
        Ok(handle)
    }

    /// Tear down the admission `token` of `id`: deregister, clear presence,
    /// broadcast the new count. Safe to call more than once, and a later
    /// admission that reused the same id is left alone.
    pub fn on_disconnect(&self, id: &str, token: u64) {
        if self.registry.remove_admission(id, token) {
            self.presence.remove(id);
            self.broadcast_user_count();
        }
    }

    /// Disconnect every connection idle for longer than `timeout`. An id
    /// that reconnected after the idle scan keeps its new admission.
    pub fn reap_inactive(&self, timeout: Duration) -> usize {
        self.reap(self.registry.inactive_since(timeout))
    }

    fn reap(&self, idle: Vec<(ClientId, u64)>) -> usize {
        let mut reaped = 0;
        for (id, token) in idle {
            if self.registry.remove_admission(&id, token) {
                info!(client_id = %id, "hub: reaped inactive connection");
                self.presence.remove(&id);
                reaped += 1;
            }
        }
        if reaped > 0 {
            self.broadcast_user_count();
        }
        reaped
    }

    // -------------------------------------------------------------------------
    // INGRESS
    // -------------------------------------------------------------------------

    /// Handle one inbound text message from `sender`.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPayload` for invalid JSON, a missing `type`, a
    /// missing or foreign `clientId`, or a payload that fails validation.
    /// Nothing is logged or relayed in that case.
    pub fn handle_inbound(&self, sender: &str, text: &str) -> Result<Dispatch, HubError> {
        self.registry.touch(sender);

        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| HubError::MalformedPayload(format!("invalid json: {e}")))?;
        let Some(kind) = envelope.kind.as_deref() else {
            return Err(HubError::MalformedPayload("message type is required".into()));
        };
        match envelope.client_id.as_deref() {
            None => return Err(HubError::MalformedPayload("clientId is required".into())),
            Some(id) if id != sender => return Err(HubError::MalformedPayload("clientId mismatch".into())),
            Some(_) => {}
        }

        let payload = envelope.payload.as_ref();
        let relay: Outbound = text.into();
        match MessageKind::parse(kind) {
            MessageKind::Draw => {
                let stroke = payload::decode_draw(payload, &self.limits).map_err(HubError::MalformedPayload)?;
                Ok(Dispatch::Logged(self.append_and_relay(sender, Action::Draw(stroke), &relay)))
            }
            MessageKind::Text => {
                let text = payload::decode_text(payload, &self.limits).map_err(HubError::MalformedPayload)?;
                Ok(Dispatch::Logged(self.append_and_relay(sender, Action::Text(text), &relay)))
            }
            MessageKind::Clear => {
                let seq = self.append_and_relay(sender, Action::Clear, &relay);
                debug!(client_id = %sender, seq, "hub: board cleared");
                Ok(Dispatch::Logged(seq))
            }
            MessageKind::Cursor => {
                let (x, y) = payload::decode_cursor(payload).map_err(HubError::MalformedPayload)?;
                self.presence.update(sender, x, y);
                let failed = self.registry.fan_out(Some(sender), &relay);
                self.drop_unreachable(failed);
                Ok(Dispatch::Relayed)
            }
            MessageKind::Other => {
                debug!(client_id = %sender, kind, "hub: ignoring message kind");
                Ok(Dispatch::Ignored)
            }
        }
    }

    fn append_and_relay(&self, sender: &str, action: Action, relay: &Outbound) -> u64 {
        let kind = action.kind();
        let (seq, failed) = self.log.append_with(action, |entry| {
            (entry.seq, self.registry.fan_out(Some(sender), relay))
        });
        debug!(client_id = %sender, kind, seq, "hub: action appended");
        self.drop_unreachable(failed);
        seq
    }

    // -------------------------------------------------------------------------
    // EGRESS
    // -------------------------------------------------------------------------

    /// Queue `msg` for `id` alone. An unreachable recipient is disconnected.
    pub fn send_to(&self, id: &str, msg: &Outbound) {
        if let Err(e) = self.registry.send_to(id, msg) {
            self.drop_unreachable(vec![e]);
        }
    }

    /// Broadcast `user_count` to every connection. The count is read and
    /// queued atomically, so the last announcement anyone receives is the
    /// current count.
    pub fn broadcast_user_count(&self) {
        let failed = self.registry.fan_out_count(message::user_count);
        self.drop_unreachable(failed);
    }

    /// Remove unreachable recipients, then re-announce the count. Repeats
    /// while the announcement itself finds more dead recipients. Only the
    /// admission that failed is removed; a reconnect under the same id stays.
    fn drop_unreachable(&self, mut failed: Vec<DeliveryError>) {
        while !failed.is_empty() {
            let mut removed = false;
            for err in &failed {
                let Some(token) = err.token() else { continue };
                if self.registry.remove_admission(err.client_id(), token) {
                    warn!(error = %err, "hub: dropped unreachable recipient");
                    self.presence.remove(err.client_id());
                    removed = true;
                }
            }
            if !removed {
                return;
            }
            failed = self.registry.fan_out_count(message::user_count);
        }
    }

    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            total_connections: self.registry.count(),
            connections: self.registry.infos(),
            log: self.log.stats(),
            cursors: self.presence.all(),
        }
    }
}

#[cfg(test)]
#[path = "hub_test.rs"]
mod tests;
