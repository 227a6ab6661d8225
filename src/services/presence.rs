//! Presence tracker — ephemeral cursor positions.
//!
//! Cursor positions are last-write-wins per client, never logged and never
//! replayed to new joiners. Reads filter out entries older than the staleness
//! window, so a stale cursor is never reported as current even between
//! sweeps; the background sweeper reclaims them.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::services::registry::ClientId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorState {
    pub x: f64,
    pub y: f64,
    pub updated_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

pub struct PresenceTracker {
    cursors: Mutex<HashMap<ClientId, CursorState>>,
    ttl: Duration,
}

impl PresenceTracker {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { cursors: Mutex::new(HashMap::new()), ttl }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ClientId, CursorState>> {
        self.cursors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn update(&self, id: &str, x: f64, y: f64) {
        self.update_at(id, x, y, Instant::now());
    }

    fn update_at(&self, id: &str, x: f64, y: f64, now: Instant) {
        self.lock()
            .insert(id.to_string(), CursorState { x, y, updated_at: now });
    }

    /// Drop the cursor for `id`, if any.
    pub fn remove(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Remove cursors not updated within `max_age`; returns who was removed.
    pub fn expire_older_than(&self, max_age: Duration) -> HashSet<ClientId> {
        self.expire_at(max_age, Instant::now())
    }

    fn expire_at(&self, max_age: Duration, now: Instant) -> HashSet<ClientId> {
        let mut cursors = self.lock();
        let expired: HashSet<ClientId> = cursors
            .iter()
            .filter(|(_, c)| now.saturating_duration_since(c.updated_at) > max_age)
            .map(|(id, _)| id.clone())
            .collect();
        cursors.retain(|id, _| !expired.contains(id));
        expired
    }

    /// Current, non-stale positions.
    #[must_use]
    pub fn all(&self) -> HashMap<ClientId, Position> {
        self.all_at(Instant::now())
    }

    fn all_at(&self, now: Instant) -> HashMap<ClientId, Position> {
        self.lock()
            .iter()
            .filter(|(_, c)| now.saturating_duration_since(c.updated_at) <= self.ttl)
            .map(|(id, c)| (id.clone(), Position { x: c.x, y: c.y }))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
