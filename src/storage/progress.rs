//! Local progress cache.
//!
//! The client's view of a user's progress items, updated optimistically when
//! actions are recorded and read by the reconciler to build snapshots.

use rusqlite::params;

use crate::error::LearnsyncError;
use crate::features::reconcile::{ItemKind, ProgressSnapshot, SyncItem};

use super::Database;

/// Progress items keyed by `(owner, kind, id)`.
pub struct ProgressCache {
    db: Database,
}

impl ProgressCache {
    /// Open the cache in the default database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open() -> Result<Self, LearnsyncError> {
        Ok(Self::with_database(Database::open()?))
    }

    /// Create a cache on an existing database connection.
    #[must_use]
    pub const fn with_database(db: Database) -> Self {
        Self { db }
    }

    /// Insert or update an item.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn record(
        &self,
        owner: &str,
        kind: ItemKind,
        item_id: &str,
        timestamp: &str,
    ) -> Result<(), LearnsyncError> {
        self.db
            .connection()
            .execute(
                r"INSERT INTO progress_items (owner, item_kind, item_id, timestamp)
                  VALUES (?1, ?2, ?3, ?4)
                  ON CONFLICT(owner, item_kind, item_id) DO UPDATE SET
                    timestamp = excluded.timestamp",
                params![owner, kind.as_str(), item_id, timestamp],
            )
            .map_err(|e| LearnsyncError::Database(format!("Failed to record item: {e}")))?;

        Ok(())
    }

    /// Remove an item. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn remove(
        &self,
        owner: &str,
        kind: ItemKind,
        item_id: &str,
    ) -> Result<bool, LearnsyncError> {
        let rows = self
            .db
            .connection()
            .execute(
                "DELETE FROM progress_items WHERE owner = ?1 AND item_kind = ?2 AND item_id = ?3",
                params![owner, kind.as_str(), item_id],
            )
            .map_err(|e| LearnsyncError::Database(format!("Failed to remove item: {e}")))?;

        Ok(rows > 0)
    }

    /// Check whether an item is cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn contains(
        &self,
        owner: &str,
        kind: ItemKind,
        item_id: &str,
    ) -> Result<bool, LearnsyncError> {
        let count: i64 = self
            .db
            .connection()
            .query_row(
                r"SELECT COUNT(*) FROM progress_items
                  WHERE owner = ?1 AND item_kind = ?2 AND item_id = ?3",
                params![owner, kind.as_str(), item_id],
                |row| row.get(0),
            )
            .map_err(|e| LearnsyncError::Database(format!("Failed to query item: {e}")))?;

        Ok(count > 0)
    }

    /// Everything cached for `owner`, each kind ordered by item id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row holds an unknown kind.
    pub fn snapshot(&self, owner: &str) -> Result<ProgressSnapshot, LearnsyncError> {
        let conn = self.db.connection();

        let mut stmt = conn
            .prepare(
                "SELECT item_kind, item_id, timestamp FROM progress_items
                 WHERE owner = ?1 ORDER BY item_kind, item_id",
            )
            .map_err(|e| LearnsyncError::Database(format!("Failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([owner], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| LearnsyncError::Database(format!("Failed to query items: {e}")))?;

        let mut snapshot = ProgressSnapshot::default();
        for row in rows {
            let (kind, id, timestamp) =
                row.map_err(|e| LearnsyncError::Database(format!("Failed to read item: {e}")))?;
            let kind = ItemKind::parse(&kind).ok_or_else(|| {
                LearnsyncError::Database(format!("Unknown item kind in cache: {kind}"))
            })?;
            snapshot.items_mut(kind).push(SyncItem::new(id, timestamp));
        }

        Ok(snapshot)
    }

    /// Drop everything cached for `owner`. Returns how many items were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn clear_owner(&self, owner: &str) -> Result<usize, LearnsyncError> {
        self.db
            .connection()
            .execute("DELETE FROM progress_items WHERE owner = ?1", [owner])
            .map_err(|e| LearnsyncError::Database(format!("Failed to clear cache: {e}")))
    }
}
