//! Shared `SQLite` handle for the action queue and the progress cache.
//!
//! Both live in `~/.learnsync/learnsync.db`. Each opens its own handle, so
//! file databases run in WAL mode with a busy timeout and the two never block
//! each other for long.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::config::Paths;
use crate::error::LearnsyncError;

use super::migrations;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A migrated connection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database under the learnsync home directory.
    ///
    /// # Errors
    ///
    /// Returns `LocalStorageUnavailable` if the file cannot be opened, or
    /// `Database` if it cannot be prepared.
    pub fn open() -> Result<Self, LearnsyncError> {
        let paths = Paths::new()?;
        paths.ensure_dirs()?;
        Self::open_at(&paths.database)
    }

    /// Open the database file at `path`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `LocalStorageUnavailable` if the file cannot be opened, or
    /// `Database` if it cannot be prepared.
    pub fn open_at(path: &Path) -> Result<Self, LearnsyncError> {
        let conn = Connection::open(path).map_err(|e| {
            LearnsyncError::LocalStorageUnavailable(format!("{}: {e}", path.display()))
        })?;

        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(|e| LearnsyncError::Database(format!("Failed to enable WAL: {e}")))?;

        Self::prepare(conn)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns `Database` if migrations fail.
    pub fn open_in_memory() -> Result<Self, LearnsyncError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| LearnsyncError::LocalStorageUnavailable(format!("in-memory: {e}")))?;
        Self::prepare(conn)
    }

    fn prepare(conn: Connection) -> Result<Self, LearnsyncError> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| LearnsyncError::Database(format!("Failed to set busy timeout: {e}")))?;
        migrations::run(&conn)?;
        Ok(Self { conn })
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}
