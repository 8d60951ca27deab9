//! Reconciliation against the server's sync endpoints.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::conflict::{compare, Conflict};
use super::fingerprint::SyncFingerprint;
use super::item::{ItemCounts, ProgressSnapshot};
use crate::error::LearnsyncError;

/// The server's summary of its inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub fingerprint: SyncFingerprint,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub item_counts: ItemCounts,
}

/// Body of a verify request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub fingerprint: SyncFingerprint,
    pub items: ProgressSnapshot,
}

impl VerifyRequest {
    /// Build a request carrying `items` and their fingerprint.
    #[must_use]
    pub fn new(items: ProgressSnapshot) -> Self {
        Self {
            fingerprint: SyncFingerprint::of(&items),
            items,
        }
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    pub in_sync: bool,
    #[serde(default)]
    pub conflicts: Vec<Conflict>,
    pub server_status: ServerStatus,
}

/// The server side of reconciliation.
#[async_trait]
pub trait SyncServer: Send + Sync {
    /// Fetch the server's fingerprint and item counts.
    async fn status(&self) -> Result<ServerStatus, LearnsyncError>;

    /// Fetch the server's full item inventory.
    async fn inventory(&self) -> Result<ProgressSnapshot, LearnsyncError>;

    /// Ask the server to diff `request` against its own inventory.
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyOutcome, LearnsyncError>;
}

/// Where the reconciler stands.
///
/// Starts at `Unknown`; every pass moves through `Verifying` to one of the
/// terminal states, and any new pass re-enters `Verifying`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncState {
    Unknown,
    Verifying,
    InSync {
        checked_at: DateTime<Utc>,
    },
    OutOfSync {
        conflicts: usize,
        checked_at: DateTime<Utc>,
    },
    Error {
        message: String,
    },
}

impl SyncState {
    /// Short label for display.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Verifying => "verifying",
            Self::InSync { .. } => "in sync",
            Self::OutOfSync { .. } => "out of sync",
            Self::Error { .. } => "error",
        }
    }
}

/// Detects divergence between local progress and the server.
///
/// Only reads: it never mutates local state or the action queue.
pub struct Reconciler<S> {
    server: S,
    state: Mutex<SyncState>,
}

impl<S: SyncServer> Reconciler<S> {
    /// Create a reconciler in the `Unknown` state.
    pub fn new(server: S) -> Self {
        Self {
            server,
            state: Mutex::new(SyncState::Unknown),
        }
    }

    /// Current state.
    pub fn state(&self) -> SyncState {
        self.state.lock().clone()
    }

    /// Fetch the server's fingerprint without touching local state.
    ///
    /// # Errors
    ///
    /// Returns `SyncFetchFailed` if the server cannot be reached or answers
    /// with an error; the reconciler moves to `Error`.
    pub async fn fetch_server_status(&self) -> Result<ServerStatus, LearnsyncError> {
        match self.server.status().await {
            Ok(status) => Ok(status),
            Err(e) => Err(self.fail(as_fetch_error(e))),
        }
    }

    /// Compare `local` with the server.
    ///
    /// Matching fingerprints short-circuit to in-sync; otherwise the server's
    /// inventory is fetched and diffed locally.
    ///
    /// # Errors
    ///
    /// Returns `SyncFetchFailed` if either fetch fails.
    pub async fn verify(&self, local: &ProgressSnapshot) -> Result<VerifyOutcome, LearnsyncError> {
        self.transition(SyncState::Verifying);

        let status = self.fetch_server_status().await?;
        let local_fingerprint = SyncFingerprint::of(local);

        let outcome = if local_fingerprint == status.fingerprint {
            tracing::debug!(fingerprint = %status.fingerprint.short(), "fingerprints match");
            compare(local, &ProgressSnapshot::default(), status)
        } else {
            tracing::debug!(
                local = %local_fingerprint.short(),
                server = %status.fingerprint.short(),
                "fingerprints differ, fetching server inventory"
            );
            let server_items = match self.server.inventory().await {
                Ok(items) => items,
                Err(e) => return Err(self.fail(as_fetch_error(e))),
            };
            compare(local, &server_items, status)
        };

        self.settle(&outcome);
        Ok(outcome)
    }

    /// Let the server compute the diff for `local`.
    ///
    /// # Errors
    ///
    /// Returns `SyncVerifyFailed` if the verify request fails.
    pub async fn verify_remote(
        &self,
        local: &ProgressSnapshot,
    ) -> Result<VerifyOutcome, LearnsyncError> {
        self.transition(SyncState::Verifying);

        let request = VerifyRequest::new(local.clone());
        let outcome = match self.server.verify(&request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let err = match e {
                    LearnsyncError::SyncVerifyFailed(_) => e,
                    other => LearnsyncError::SyncVerifyFailed(other.to_string()),
                };
                return Err(self.fail(err));
            },
        };

        self.settle(&outcome);
        Ok(outcome)
    }

    fn settle(&self, outcome: &VerifyOutcome) {
        let checked_at = Utc::now();
        if outcome.in_sync {
            self.transition(SyncState::InSync { checked_at });
        } else {
            self.transition(SyncState::OutOfSync {
                conflicts: outcome.conflicts.len(),
                checked_at,
            });
        }
    }

    fn fail(&self, err: LearnsyncError) -> LearnsyncError {
        tracing::warn!(error = %err, "reconciliation failed");
        self.transition(SyncState::Error {
            message: err.to_string(),
        });
        err
    }

    fn transition(&self, next: SyncState) {
        let mut state = self.state.lock();
        tracing::debug!(from = state.label(), to = next.label(), "sync state");
        *state = next;
    }
}

fn as_fetch_error(err: LearnsyncError) -> LearnsyncError {
    match err {
        LearnsyncError::SyncFetchFailed(_) => err,
        other => LearnsyncError::SyncFetchFailed(other.to_string()),
    }
}
