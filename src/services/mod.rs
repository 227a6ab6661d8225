//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the shared board state and its concurrency rules so
//! route handlers can stay focused on protocol translation.

pub mod action_log;
pub mod ai;
pub mod hub;
pub mod payload;
pub mod presence;
pub mod registry;
pub mod sweeper;
