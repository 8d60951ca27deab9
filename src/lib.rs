//! learnsync - offline durability and sync for an e-learning client
//!
//! This crate keeps user actions (lesson completions, quiz submissions,
//! bookmarks, notes) in a durable local queue until the server acknowledges
//! them, and reconciles the device's progress with the server's.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod features;
pub mod output;
pub mod storage;

pub use api::ApiClient;
pub use cli::args::{Cli, Commands, OutputFormat};
pub use error::{DeliveryError, DropReason, LearnsyncError};
pub use features::queue::{Action, ActionQueue, QueueEvent, QueueStatus};
pub use features::reconcile::{Reconciler, SyncState};
pub use features::Session;
