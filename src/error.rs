//! Error types for learnsync.

use thiserror::Error;

/// Errors returned by the queue, the reconciler, and the command layer.
#[derive(Debug, Error)]
pub enum LearnsyncError {
    /// The durable action store could not be read or written.
    ///
    /// Fatal to the queue: an action that cannot be persisted is not accepted.
    #[error("Local storage unavailable: {0}")]
    LocalStorageUnavailable(String),

    /// `retry_all` was requested while the device is offline.
    #[error("Cannot retry queued actions while offline")]
    OfflineRetryRejected,

    /// The server's sync status or inventory could not be fetched.
    #[error("Sync status fetch failed: {0}")]
    SyncFetchFailed(String),

    /// The server's verify endpoint failed.
    #[error("Sync verify failed: {0}")]
    SyncVerifyFailed(String),

    /// Database error outside the action store (migrations, progress cache).
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration or argument error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client could not be constructed.
    #[error("Network error: {0}")]
    Network(String),

    /// JSON parse error.
    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LearnsyncError {
    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::OfflineRetryRejected | Self::SyncFetchFailed(_) | Self::Network(_) => 3,
            Self::SyncVerifyFailed(_) => 4,
            Self::LocalStorageUnavailable(_) | Self::Database(_) => 5,
            Self::Parse(_) | Self::Io(_) => 1,
        }
    }
}

/// A single failed delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The attempt did not complete before its deadline.
    #[error("request timed out")]
    Timeout,

    /// The request never produced an HTTP response.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("server responded {code}: {body}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Response body, truncated.
        body: String,
    },
}

impl DeliveryError {
    /// Whether this failure is worth another attempt.
    ///
    /// Timeouts, transport errors, 5xx, 408 and 429 are transient. Any other
    /// 4xx is a rejection of the action itself.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::Status { code, .. } => !is_client_error(*code) || *code == 408 || *code == 429,
        }
    }
}

const fn is_client_error(code: u16) -> bool {
    code >= 400 && code < 500
}

/// Why an action left the queue without being delivered.
///
/// Every drop is a data-loss event and is published on the queue's event
/// channel as well as logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DropReason {
    /// Delivery kept failing past the retry ceiling.
    #[error("retry ceiling exceeded after {attempts} attempts: {last_error}")]
    RetryCeilingExceeded {
        /// Total delivery attempts made, including the first.
        attempts: u32,
        /// The final failure.
        last_error: DeliveryError,
    },

    /// The server rejected the action as invalid.
    #[error("rejected by server with status {code}")]
    Rejected {
        /// HTTP status code.
        code: u16,
    },
}
