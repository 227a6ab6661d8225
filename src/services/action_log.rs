//! Action log — ordered, append-only history of board mutations.
//!
//! DESIGN
//! ======
//! The log is the single source of truth for what the canvas looks like.
//! Replaying `snapshot()` onto an empty canvas reproduces the live canvas.
//!
//! COMPACTION
//! ==========
//! A `Clear` resets everything drawn before it, so appending one drops all
//! earlier entries and keeps the `Clear` as the new head. The `Clear` itself
//! is retained as an event (it still owns its sequence number) but is left
//! out of `snapshot()`, where it would be a no-op on an empty canvas.
//!
//! Without clears the log grows with every stroke for the life of the
//! process. There is no persistence and no time-based eviction; memory is
//! proportional to strokes drawn since the last clear.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

// =============================================================================
// ACTIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Pen,
    Eraser,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A validated freehand stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawStroke {
    pub tool: Tool,
    pub color: String,
    pub size: u32,
    pub points: Vec<Point>,
}

/// An immutable board mutation. Serializes as `{type, payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Action {
    Draw(DrawStroke),
    /// Text placement, kept as its validated payload and replayed as-is.
    Text(serde_json::Value),
    Clear,
}

impl Action {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Draw(_) => "draw",
            Self::Text(_) => "text",
            Self::Clear => "clear",
        }
    }

    #[must_use]
    pub fn is_clear(&self) -> bool {
        matches!(self, Self::Clear)
    }
}

/// An action as stored, tagged with its sequence number.
#[derive(Debug, Clone)]
pub struct LoggedAction {
    pub seq: u64,
    pub action: Arc<Action>,
}

// =============================================================================
// LOG
// =============================================================================

#[derive(Default)]
struct LogInner {
    entries: Vec<LoggedAction>,
    /// Sequence number of the most recent append; 0 before the first.
    last_seq: u64,
    /// Entries dropped by compaction so far.
    compacted: u64,
}

impl LogInner {
    fn append(&mut self, action: Action) -> LoggedAction {
        self.last_seq += 1;
        if action.is_clear() {
            self.compacted += self.entries.len() as u64;
            self.entries.clear();
        }
        let entry = LoggedAction { seq: self.last_seq, action: Arc::new(action) };
        self.entries.push(entry.clone());
        entry
    }

    fn snapshot(&self) -> Vec<Action> {
        self.entries
            .iter()
            .filter(|e| !e.action.is_clear())
            .map(|e| e.action.as_ref().clone())
            .collect()
    }
}

/// Summary counters for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogStats {
    pub entries: usize,
    pub last_seq: u64,
    pub compacted: u64,
}

#[derive(Default)]
pub struct ActionLog {
    inner: Mutex<LogInner>,
}

impl ActionLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an action and return its sequence number.
    #[cfg(test)]
    pub(crate) fn append(&self, action: Action) -> u64 {
        self.lock().append(action).seq
    }

    /// Append an action and run `f` while the log is still locked.
    ///
    /// Callers fan the action out inside `f` so a concurrent joiner sees it
    /// either in its snapshot or live, never both and never neither.
    pub fn append_with<R>(&self, action: Action, f: impl FnOnce(&LoggedAction) -> R) -> R {
        let mut inner = self.lock();
        let entry = inner.append(action);
        f(&entry)
    }

    /// Actions that reproduce the current canvas when replayed from empty.
    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> Vec<Action> {
        self.lock().snapshot()
    }

    /// Take a snapshot and run `f` while the log is still locked.
    pub fn snapshot_with<R>(&self, f: impl FnOnce(Vec<Action>) -> R) -> R {
        let inner = self.lock();
        let actions = inner.snapshot();
        f(actions)
    }

    /// Retained entries, including a leading `Clear` if one was compacted to.
    #[cfg(test)]
    pub(crate) fn history(&self) -> Vec<LoggedAction> {
        self.lock().entries.clone()
    }

    #[must_use]
    pub fn stats(&self) -> LogStats {
        let inner = self.lock();
        LogStats { entries: inner.entries.len(), last_seq: inner.last_seq, compacted: inner.compacted }
    }
}

#[cfg(test)]
#[path = "action_log_test.rs"]
mod tests;
