//! Content fingerprint of a progress inventory.
//!
//! The canonical form renders every item as `id:timestamp`, sorts each kind's
//! entries lexicographically, joins them with `,`, prefixes each section with
//! its kind, and joins the four sections with `|`. The digest is SHA-256 over
//! that string, so two inventories share a fingerprint exactly when they hold
//! the same items with the same timestamps, regardless of order.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::item::{ItemKind, ProgressSnapshot};

/// Hex-encoded SHA-256 digest of a canonical progress inventory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncFingerprint(String);

impl SyncFingerprint {
    /// Compute the fingerprint of an inventory.
    #[must_use]
    pub fn of(snapshot: &ProgressSnapshot) -> Self {
        let digest = Sha256::digest(canonicalize(snapshot).as_bytes());
        Self(hex::encode(digest))
    }

    /// Wrap a fingerprint received from the server.
    #[must_use]
    pub fn from_hex(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for display.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl std::fmt::Display for SyncFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical serialization hashed by [`SyncFingerprint::of`].
#[must_use]
pub fn canonicalize(snapshot: &ProgressSnapshot) -> String {
    ItemKind::ALL
        .iter()
        .map(|kind| {
            let mut entries: Vec<String> = snapshot
                .items(*kind)
                .iter()
                .map(|item| format!("{}:{}", item.id, item.timestamp))
                .collect();
            entries.sort();
            format!("{}={}", kind.as_str(), entries.join(","))
        })
        .collect::<Vec<_>>()
        .join("|")
}
