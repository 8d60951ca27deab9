//! Path resolution for learnsync configuration and data files.
//!
//! All learnsync data is stored in `~/.learnsync/`:
//! - `config.yaml` - Main configuration file
//! - `learnsync.db` - SQLite database holding the action queue and progress cache
//!
//! The root can be moved with the `LEARNSYNC_HOME` environment variable.

use std::path::PathBuf;

use crate::error::LearnsyncError;

/// Environment variable overriding the data root.
pub const HOME_ENV: &str = "LEARNSYNC_HOME";

/// Paths to learnsync configuration and data files.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root directory: `~/.learnsync/`
    pub root: PathBuf,
    /// Config file: `~/.learnsync/config.yaml`
    pub config_file: PathBuf,
    /// Database file: `~/.learnsync/learnsync.db`
    pub database: PathBuf,
}

impl Paths {
    /// Resolve paths from `LEARNSYNC_HOME`, falling back to `$HOME/.learnsync`.
    ///
    /// # Errors
    ///
    /// Returns an error if neither variable is set.
    pub fn new() -> Result<Self, LearnsyncError> {
        if let Ok(root) = std::env::var(HOME_ENV) {
            if !root.is_empty() {
                return Ok(Self::with_root(PathBuf::from(root)));
            }
        }

        let home = std::env::var("HOME").map_err(|_| {
            LearnsyncError::Config("Could not determine home directory".to_string())
        })?;

        Ok(Self::with_root(PathBuf::from(home).join(".learnsync")))
    }

    /// Create paths with a custom root directory (useful for testing).
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            config_file: root.join("config.yaml"),
            database: root.join("learnsync.db"),
            root,
        }
    }

    /// Ensure the root directory exists.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure_dirs(&self) -> Result<(), LearnsyncError> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root).map_err(|e| {
                LearnsyncError::LocalStorageUnavailable(format!(
                    "Failed to create directory {}: {e}",
                    self.root.display()
                ))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_with_root() {
        let root = PathBuf::from("/tmp/test-learnsync");
        let paths = Paths::with_root(root.clone());

        assert_eq!(paths.root, root);
        assert_eq!(paths.config_file, root.join("config.yaml"));
        assert_eq!(paths.database, root.join("learnsync.db"));
    }

    #[test]
    fn test_ensure_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let paths = Paths::with_root(temp_dir.path().join("nested").join("root"));

        paths.ensure_dirs().unwrap();
        assert!(paths.root.exists());

        // Second call is a no-op
        paths.ensure_dirs().unwrap();
    }
}
