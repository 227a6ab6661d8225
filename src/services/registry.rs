//! Connection registry — live connections keyed by client identity.
//!
//! DESIGN
//! ======
//! Each admitted connection owns a bounded outbound queue. The registry keeps
//! the sending half plus bookkeeping; the connection task keeps the receiving
//! half. Removing an entry drops the sender, which ends the task's queue and
//! with it the task.
//!
//! Enumeration snapshots the recipients under the read lock and delivers
//! after releasing it, so concurrent admit/remove never blocks on delivery
//! and a recipient removed mid-fan-out is simply a failed `try_send`.
//!
//! The connection count is the exception: `fan_out_count` reads it and
//! queues the announcement under one read guard. No admit or remove can land
//! in between, so every recipient sees the counts in the order they changed.
//!
//! Every admission carries a token. Removal on behalf of a stale observation
//! (an idle scan, a failed delivery) goes through `remove_admission`, which
//! leaves a newer admission under the same id alone.
//!
//! Delivery is non-blocking. A full queue means the recipient is too slow
//! to keep up; it is reported as unreachable exactly like a closed one, and
//! the hub disconnects it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::message::Outbound;

pub type ClientId = String;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("client identity already connected: {0}")]
    DuplicateIdentity(ClientId),
}

impl crate::message::ErrorCode for RegistryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateIdentity(_) => "E_DUPLICATE_IDENTITY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unreachable {
    /// Outbound queue is full.
    Lagging,
    /// Receiving task is gone.
    Closed,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// `token` identifies the admission that failed; `None` if `id` was not
    /// registered at all.
    #[error("recipient unreachable: {id} ({reason:?})")]
    RecipientUnreachable { id: ClientId, token: Option<u64>, reason: Unreachable },
}

impl DeliveryError {
    #[must_use]
    pub fn client_id(&self) -> &str {
        match self {
            Self::RecipientUnreachable { id, .. } => id,
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<u64> {
        match self {
            Self::RecipientUnreachable { token, .. } => *token,
        }
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

struct Connection {
    token: u64,
    tx: mpsc::Sender<Outbound>,
    connected_at: OffsetDateTime,
    last_activity: OffsetDateTime,
    ip_address: Option<String>,
}

/// Receiving side handed to the connection task on admission.
pub struct ConnectionHandle {
    pub id: ClientId,
    /// Distinguishes this admission from a later one reusing the same id.
    pub token: u64,
    pub rx: mpsc::Receiver<Outbound>,
}

/// One connection's sending half, snapshotted for enumeration.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub id: ClientId,
    pub token: u64,
    pub tx: mpsc::Sender<Outbound>,
}

/// Point-in-time view of one connection.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub client_id: ClientId,
    /// Unix seconds.
    pub connected_at: f64,
    /// Unix seconds.
    pub last_activity: f64,
    pub ip_address: Option<String>,
    pub session_duration: f64,
}

fn unix_seconds(ts: OffsetDateTime) -> f64 {
    (ts - OffsetDateTime::UNIX_EPOCH).as_seconds_f64()
}

// =============================================================================
// REGISTRY
// =============================================================================

pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ClientId, Connection>>,
    queue_capacity: usize,
    next_token: AtomicU64,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
            next_token: AtomicU64::new(1),
        }
    }

    #[cfg(test)]
    pub(crate) fn admit(&self, id: &str, ip_address: Option<String>) -> Result<ConnectionHandle, RegistryError> {
        self.admit_at(id, ip_address, None, OffsetDateTime::now_utc())
    }

    /// Register `id` and create its outbound queue with `first` already
    /// queued, before the connection becomes visible to any fan-out.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateIdentity` if `id` is already registered.
    pub fn admit_with(
        &self,
        id: &str,
        ip_address: Option<String>,
        first: &Outbound,
    ) -> Result<ConnectionHandle, RegistryError> {
        self.admit_at(id, ip_address, Some(first), OffsetDateTime::now_utc())
    }

    fn admit_at(
        &self,
        id: &str,
        ip_address: Option<String>,
        first: Option<&Outbound>,
        now: OffsetDateTime,
    ) -> Result<ConnectionHandle, RegistryError> {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if connections.contains_key(id) {
            return Err(RegistryError::DuplicateIdentity(id.to_string()));
        }
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        if let Some(first) = first {
            // Fresh queue with capacity >= 1.
            let _ = tx.try_send(first.clone());
        }
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        connections.insert(
            id.to_string(),
            Connection { token, tx, connected_at: now, last_activity: now, ip_address: ip_address.clone() },
        );
        info!(client_id = %id, ip = ip_address.as_deref().unwrap_or("unknown"), total = connections.len(), "registry: admitted");
        Ok(ConnectionHandle { id: id.to_string(), token, rx })
    }

    /// Remove `id`. Returns whether an entry was actually removed.
    #[cfg(test)]
    pub(crate) fn remove(&self, id: &str) -> bool {
        self.remove_where(id, None)
    }

    /// Remove `id` only if it is still the admission identified by `token`.
    pub fn remove_admission(&self, id: &str, token: u64) -> bool {
        self.remove_where(id, Some(token))
    }

    fn remove_where(&self, id: &str, token: Option<u64>) -> bool {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if token.is_some_and(|t| connections.get(id).is_some_and(|c| c.token != t)) {
            return false;
        }
        let Some(conn) = connections.remove(id) else {
            return false;
        };
        let session = (OffsetDateTime::now_utc() - conn.connected_at).as_seconds_f64();
        info!(client_id = %id, session_secs = session, total = connections.len(), "registry: removed");
        true
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: &str) -> bool {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Record inbound activity for `id`.
    pub fn touch(&self, id: &str) {
        self.touch_at(id, OffsetDateTime::now_utc());
    }

    fn touch_at(&self, id: &str, now: OffsetDateTime) {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(conn) = connections.get_mut(id) {
            conn.last_activity = now;
        }
    }

    /// Call `f` for every connection except `id`, with a snapshot of senders.
    pub fn for_each_except(&self, id: &str, f: impl FnMut(&Recipient)) {
        self.recipients(Some(id)).iter().for_each(f);
    }

    /// Call `f` for every connection, with a snapshot of senders.
    pub fn for_each_all(&self, f: impl FnMut(&Recipient)) {
        self.recipients(None).iter().for_each(f);
    }

    fn recipients(&self, exclude: Option<&str>) -> Vec<Recipient> {
        let connections = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        connections
            .iter()
            .filter(|(id, _)| exclude != Some(id.as_str()))
            .map(|(id, conn)| Recipient { id: id.clone(), token: conn.token, tx: conn.tx.clone() })
            .collect()
    }

    /// Queue `msg` for one connection.
    ///
    /// # Errors
    ///
    /// Returns `RecipientUnreachable` if `id` is unknown, lagging, or closed.
    pub fn send_to(&self, id: &str, msg: &Outbound) -> Result<(), DeliveryError> {
        let target = {
            let connections = self
                .connections
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            connections.get(id).map(|c| (c.token, c.tx.clone()))
        };
        let Some((token, tx)) = target else {
            return Err(DeliveryError::RecipientUnreachable {
                id: id.to_string(),
                token: None,
                reason: Unreachable::Closed,
            });
        };
        deliver(id, token, &tx, msg)
    }

    /// Queue `msg` for every connection except `exclude`. Returns one error
    /// per recipient that could not take the message; others still get it.
    pub fn fan_out(&self, exclude: Option<&str>, msg: &Outbound) -> Vec<DeliveryError> {
        let mut failed = Vec::new();
        let mut push = |r: &Recipient| {
            if let Err(e) = deliver(&r.id, r.token, &r.tx, msg) {
                failed.push(e);
            }
        };
        match exclude {
            Some(id) => self.for_each_except(id, &mut push),
            None => self.for_each_all(&mut push),
        }
        failed
    }

    /// Queue `build(count)` for every connection, where `count` is the number
    /// of connections at that instant. Count and delivery share one read
    /// guard; `try_send` never blocks, so holding it is short.
    pub fn fan_out_count(&self, build: impl FnOnce(usize) -> Outbound) -> Vec<DeliveryError> {
        let connections = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let msg = build(connections.len());
        connections
            .iter()
            .filter_map(|(id, conn)| deliver(id, conn.token, &conn.tx, &msg).err())
            .collect()
    }

    /// Admissions with no activity for longer than `timeout`, as `(id, token)`.
    #[must_use]
    pub fn inactive_since(&self, timeout: Duration) -> Vec<(ClientId, u64)> {
        self.inactive_at(timeout, OffsetDateTime::now_utc())
    }

    fn inactive_at(&self, timeout: Duration, now: OffsetDateTime) -> Vec<(ClientId, u64)> {
        let connections = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        connections
            .iter()
            .filter(|(_, conn)| (now - conn.last_activity).unsigned_abs() > timeout)
            .map(|(id, conn)| (id.clone(), conn.token))
            .collect()
    }

    #[must_use]
    pub fn infos(&self) -> Vec<ConnectionInfo> {
        let connections = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut infos: Vec<ConnectionInfo> = connections
            .iter()
            .map(|(id, conn)| ConnectionInfo {
                client_id: id.clone(),
                connected_at: unix_seconds(conn.connected_at),
                last_activity: unix_seconds(conn.last_activity),
                ip_address: conn.ip_address.clone(),
                session_duration: (conn.last_activity - conn.connected_at).as_seconds_f64(),
            })
            .collect();
        infos.sort_by(|a, b| a.connected_at.total_cmp(&b.connected_at));
        infos
    }
}

fn deliver(id: &str, token: u64, tx: &mpsc::Sender<Outbound>, msg: &Outbound) -> Result<(), DeliveryError> {
    tx.try_send(msg.clone()).map_err(|e| {
        let reason = match e {
            mpsc::error::TrySendError::Full(_) => Unreachable::Lagging,
            mpsc::error::TrySendError::Closed(_) => Unreachable::Closed,
        };
        debug!(client_id = %id, ?reason, "registry: delivery failed");
        DeliveryError::RecipientUnreachable { id: id.to_string(), token: Some(token), reason }
    })
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
