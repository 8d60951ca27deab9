//! Configuration management for learnsync.
//!
//! This module handles loading configuration from `~/.learnsync/`.

mod paths;
mod settings;

pub use paths::{Paths, HOME_ENV};
pub use settings::{Config, GeneralConfig, QueueConfig, ServerConfig, SyncConfig};
