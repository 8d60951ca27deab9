//! Feature implementations for learnsync.
//!
//! - Durable action queue
//! - Progress reconciliation
//! - Sessions tying both to the progress cache

pub mod queue;
pub mod reconcile;
pub mod session;

pub use session::{Session, TickReport};
