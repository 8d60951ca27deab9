//! Database migrations for learnsync.
//!
//! Each migration is a function that upgrades the schema by one version.
//! Migrations are run automatically when the database is opened.

use rusqlite::Connection;

use crate::error::LearnsyncError;

/// Current schema version.
const CURRENT_VERSION: i32 = 1;

/// Get the current schema version from the database.
///
/// Returns 0 if no version has been set (new database).
pub fn get_version(conn: &Connection) -> Result<i32, LearnsyncError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| LearnsyncError::Database(format!("Failed to get schema version: {e}")))
}

/// Set the schema version in the database.
fn set_version(conn: &Connection, version: i32) -> Result<(), LearnsyncError> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))
        .map_err(|e| LearnsyncError::Database(format!("Failed to set schema version: {e}")))
}

/// Run all pending migrations.
pub fn run(conn: &Connection) -> Result<(), LearnsyncError> {
    let current = get_version(conn)?;

    if current >= CURRENT_VERSION {
        return Ok(());
    }

    for version in (current + 1)..=CURRENT_VERSION {
        run_migration(conn, version)?;
        set_version(conn, version)?;
    }

    Ok(())
}

/// Run a specific migration.
fn run_migration(conn: &Connection, version: i32) -> Result<(), LearnsyncError> {
    match version {
        1 => migrate_v1(conn),
        _ => Err(LearnsyncError::Database(format!(
            "Unknown migration version: {version}"
        ))),
    }
}

/// Migration v1: Initial schema.
///
/// Creates tables for:
/// - `action_queue`: actions not yet acknowledged by the server, keyed by
///   action id, with `seq` as the insertion-order index
/// - `progress_items`: the local progress cache compared during reconciliation
fn migrate_v1(conn: &Connection) -> Result<(), LearnsyncError> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS action_queue (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            owner TEXT NOT NULL,
            kind TEXT NOT NULL,
            payload TEXT NOT NULL,
            enqueued_at TEXT NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_action_queue_owner
        ON action_queue(owner);

        CREATE INDEX IF NOT EXISTS idx_action_queue_enqueued
        ON action_queue(enqueued_at, seq);

        CREATE TABLE IF NOT EXISTS progress_items (
            owner TEXT NOT NULL,
            item_kind TEXT NOT NULL,
            item_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            PRIMARY KEY (owner, item_kind, item_id)
        );
        ",
    )
    .map_err(|e| LearnsyncError::Database(format!("Migration v1 failed: {e}")))
}
