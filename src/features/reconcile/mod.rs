//! Cross-device progress reconciliation.
//!
//! Compares the device's progress cache with the server's inventory:
//! - Order-independent SHA-256 fingerprints for a cheap equality check
//! - Full outer join into typed conflicts when fingerprints differ
//! - Pluggable resolution strategies that decide without applying

mod conflict;
mod fingerprint;
mod item;
mod reconciler;
mod strategy;

pub use conflict::{compare, detect_conflicts, Conflict, ConflictKind};
pub use fingerprint::{canonicalize, SyncFingerprint};
pub use item::{ItemCounts, ItemKind, ProgressSnapshot, SyncItem};
pub use reconciler::{
    Reconciler, ServerStatus, SyncServer, SyncState, VerifyOutcome, VerifyRequest,
};
pub use strategy::{parse_timestamp, resolve, resolve_conflict, Resolution, ResolutionStrategy};
