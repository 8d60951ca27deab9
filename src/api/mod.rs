//! Server contract.
//!
//! [`ApiClient`] delivers queued actions to their submission routes and
//! answers the reconciler's status, inventory, and verify requests.

mod client;

pub use client::ApiClient;
