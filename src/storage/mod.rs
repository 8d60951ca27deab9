//! Storage layer for learnsync.
//!
//! This module provides SQLite-based persistence for:
//! - The durable action queue (see `features::queue`)
//! - The local progress cache

mod database;
mod migrations;
mod progress;

pub use database::Database;
pub use progress::ProgressCache;
