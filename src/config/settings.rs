//! Configuration settings for learnsync.
//!
//! Settings are loaded from `~/.learnsync/config.yaml`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::args::OutputFormat;
use crate::config::Paths;
use crate::error::LearnsyncError;
use crate::features::queue::RetryPolicy;
use crate::features::reconcile::ResolutionStrategy;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// Server connection settings.
    pub server: ServerConfig,
    /// Action queue settings.
    pub queue: QueueConfig,
    /// Reconciliation settings.
    pub sync: SyncConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default output format.
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
    /// Default owner for queued actions when `--user` is not given.
    #[serde(default)]
    pub user: Option<String>,
}

/// Server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the learning platform.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Bearer token for authenticated requests.
    #[serde(default)]
    pub token: Option<String>,
}

/// Action queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Failed attempts tolerated before an action is dropped.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Retry 4xx rejections like transient failures instead of dropping them.
    #[serde(default)]
    pub retry_client_errors: bool,
    /// Stop a drain pass at the first failed action.
    #[serde(default)]
    pub stop_on_failure: bool,
}

/// Reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Default conflict resolution strategy.
    #[serde(default = "default_strategy")]
    pub strategy: ResolutionStrategy,
    /// Seconds between iterations of `learnsync watch`.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

// Default value functions for serde
const fn default_output_format() -> OutputFormat {
    OutputFormat::Pretty
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

const fn default_timeout_secs() -> u64 {
    15
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_strategy() -> ResolutionStrategy {
    ResolutionStrategy::LatestWins
}

const fn default_interval_secs() -> u64 {
    300
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: default_output_format(),
            user: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            token: None,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_client_errors: false,
            stop_on_failure: false,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl ServerConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl QueueConfig {
    /// Build the queue's retry policy, bounding each attempt by `attempt_timeout`.
    #[must_use]
    pub const fn retry_policy(&self, attempt_timeout: Duration) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_client_errors: self.retry_client_errors,
            stop_on_failure: self.stop_on_failure,
            attempt_timeout,
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self, LearnsyncError> {
        let paths = Paths::new()?;
        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, LearnsyncError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            LearnsyncError::Config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        serde_yaml::from_str(&contents).map_err(|e| {
            LearnsyncError::Config(format!(
                "Failed to parse config file {}: {e}",
                path.display()
            ))
        })
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save_to_path(&self, path: &std::path::Path) -> Result<(), LearnsyncError> {
        let contents = serde_yaml::to_string(self)
            .map_err(|e| LearnsyncError::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, contents).map_err(|e| {
            LearnsyncError::Config(format!(
                "Failed to write config file {}: {e}",
                path.display()
            ))
        })
    }
}
