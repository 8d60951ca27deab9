//! Durable storage for queued actions.
//!
//! [`ActionStore`] is the keyed store the queue persists through;
//! [`SqliteActionStore`] backs it with the `action_queue` table.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::action::{Action, QueuedAction};
use crate::error::LearnsyncError;
use crate::storage::Database;

/// A durable store of queued actions keyed by action id.
///
/// Implementations must survive process restarts and return actions in
/// `enqueued_at` order, breaking ties by insertion order.
#[cfg_attr(test, mockall::automock)]
pub trait ActionStore {
    /// Insert an action, or overwrite the stored copy with the same id.
    fn put(&mut self, action: &QueuedAction) -> Result<(), LearnsyncError>;

    /// Remove an action. Returns whether it was present.
    fn delete(&mut self, id: &str) -> Result<bool, LearnsyncError>;

    /// All stored actions in delivery order.
    fn get_all(&self) -> Result<Vec<QueuedAction>, LearnsyncError>;

    /// Stored actions for one owner, in delivery order.
    fn get_by_owner(&self, owner: &str) -> Result<Vec<QueuedAction>, LearnsyncError>;

    /// Number of stored actions.
    fn count(&self) -> Result<usize, LearnsyncError>;

    /// Newest `enqueued_at` in the store.
    fn latest_enqueued_at(&self) -> Result<Option<DateTime<Utc>>, LearnsyncError>;

    /// Remove every action. Returns how many were removed.
    fn clear(&mut self) -> Result<usize, LearnsyncError>;
}

/// `SQLite`-backed action store.
pub struct SqliteActionStore {
    db: Database,
}

const SELECT_COLUMNS: &str =
    "SELECT id, owner, payload, enqueued_at, retry_count FROM action_queue";

impl SqliteActionStore {
    /// Open the store in the default database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open() -> Result<Self, LearnsyncError> {
        Ok(Self::with_database(Database::open()?))
    }

    /// Create a store on an existing database connection.
    #[must_use]
    pub const fn with_database(db: Database) -> Self {
        Self { db }
    }

    fn query(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<QueuedAction>, LearnsyncError> {
        let conn = self.db.connection();

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| unavailable("prepare query", &e))?;

        let rows = stmt
            .query_map(params, row_to_action)
            .map_err(|e| unavailable("query actions", &e))?;

        let mut actions = Vec::new();
        for row in rows {
            actions.push(row.map_err(|e| unavailable("read action", &e))?);
        }
        Ok(actions)
    }
}

impl ActionStore for SqliteActionStore {
    fn put(&mut self, action: &QueuedAction) -> Result<(), LearnsyncError> {
        let payload = serde_json::to_string(&action.action)?;

        self.db
            .connection()
            .execute(
                r"INSERT INTO action_queue (id, owner, kind, payload, enqueued_at, retry_count)
                  VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                  ON CONFLICT(id) DO UPDATE SET
                    owner = excluded.owner,
                    kind = excluded.kind,
                    payload = excluded.payload,
                    enqueued_at = excluded.enqueued_at,
                    retry_count = excluded.retry_count",
                params![
                    action.id,
                    action.owner,
                    action.kind().as_str(),
                    payload,
                    action.enqueued_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                    action.retry_count,
                ],
            )
            .map_err(|e| unavailable("store action", &e))?;

        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<bool, LearnsyncError> {
        let rows = self
            .db
            .connection()
            .execute("DELETE FROM action_queue WHERE id = ?1", [id])
            .map_err(|e| unavailable("delete action", &e))?;

        Ok(rows > 0)
    }

    fn get_all(&self) -> Result<Vec<QueuedAction>, LearnsyncError> {
        self.query(
            &format!("{SELECT_COLUMNS} ORDER BY enqueued_at ASC, seq ASC"),
            &[],
        )
    }

    fn get_by_owner(&self, owner: &str) -> Result<Vec<QueuedAction>, LearnsyncError> {
        self.query(
            &format!("{SELECT_COLUMNS} WHERE owner = ?1 ORDER BY enqueued_at ASC, seq ASC"),
            &[&owner],
        )
    }

    fn count(&self) -> Result<usize, LearnsyncError> {
        let count: i64 = self
            .db
            .connection()
            .query_row("SELECT COUNT(*) FROM action_queue", [], |row| row.get(0))
            .map_err(|e| unavailable("count actions", &e))?;

        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn latest_enqueued_at(&self) -> Result<Option<DateTime<Utc>>, LearnsyncError> {
        let latest: Option<String> = self
            .db
            .connection()
            .query_row(
                "SELECT enqueued_at FROM action_queue ORDER BY enqueued_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| unavailable("read latest action", &e))?;

        Ok(latest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc)))
    }

    fn clear(&mut self) -> Result<usize, LearnsyncError> {
        self.db
            .connection()
            .execute("DELETE FROM action_queue", [])
            .map_err(|e| unavailable("clear queue", &e))
    }
}

fn unavailable(what: &str, e: &rusqlite::Error) -> LearnsyncError {
    LearnsyncError::LocalStorageUnavailable(format!("Failed to {what}: {e}"))
}

fn row_to_action(row: &Row<'_>) -> Result<QueuedAction, rusqlite::Error> {
    let id: String = row.get(0)?;
    let owner: String = row.get(1)?;
    let payload: String = row.get(2)?;
    let enqueued_at_str: String = row.get(3)?;
    let retry_count: u32 = row.get(4)?;

    let action: Action = serde_json::from_str(&payload).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let enqueued_at = DateTime::parse_from_rfc3339(&enqueued_at_str)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?
        .with_timezone(&Utc);

    Ok(QueuedAction {
        id,
        action,
        owner,
        enqueued_at,
        retry_count,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn create_test_store() -> SqliteActionStore {
        SqliteActionStore::with_database(Database::open_in_memory().unwrap())
    }

    fn queued(action: Action, owner: &str, offset_secs: i64) -> QueuedAction {
        let base = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        QueuedAction::new(action, owner, base + Duration::seconds(offset_secs))
    }

    #[test]
    fn test_put_and_get_all() {
        let mut store = create_test_store();
        let action = queued(Action::lesson_complete("l1", Some(30)), "u1", 0);

        store.put(&action).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all, vec![action]);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_put_overwrites_same_id() {
        let mut store = create_test_store();
        let mut action = queued(Action::bookmark_toggle("l1"), "u1", 0);
        store.put(&action).unwrap();

        action.retry_count = 2;
        store.put(&action).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].retry_count, 2);
    }

    #[test]
    fn test_ordering_by_enqueued_then_insertion() {
        let mut store = create_test_store();
        let later = queued(Action::note_save("l1", "b"), "u1", 10);
        let tie_a = queued(Action::note_save("l1", "a1"), "u1", 5);
        let tie_b = queued(Action::note_save("l1", "a2"), "u1", 5);

        store.put(&later).unwrap();
        store.put(&tie_a).unwrap();
        store.put(&tie_b).unwrap();

        let ids: Vec<String> = store.get_all().unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![tie_a.id, tie_b.id, later.id]);
    }

    #[test]
    fn test_get_by_owner() {
        let mut store = create_test_store();
        store.put(&queued(Action::bookmark_toggle("l1"), "alice", 0)).unwrap();
        store.put(&queued(Action::bookmark_toggle("l2"), "bob", 1)).unwrap();
        store.put(&queued(Action::bookmark_toggle("l3"), "alice", 2)).unwrap();

        let alice = store.get_by_owner("alice").unwrap();
        assert_eq!(alice.len(), 2);
        assert!(alice.iter().all(|a| a.owner == "alice"));
        assert!(store.get_by_owner("carol").unwrap().is_empty());
    }

    #[test]
    fn test_delete() {
        let mut store = create_test_store();
        let action = queued(Action::bookmark_toggle("l1"), "u1", 0);
        store.put(&action).unwrap();

        assert!(store.delete(&action.id).unwrap());
        assert!(!store.delete(&action.id).unwrap());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_latest_enqueued_at() {
        let mut store = create_test_store();
        assert_eq!(store.latest_enqueued_at().unwrap(), None);

        let early = queued(Action::bookmark_toggle("l1"), "u1", 0);
        let late = queued(Action::bookmark_toggle("l2"), "u1", 60);
        store.put(&late).unwrap();
        store.put(&early).unwrap();

        assert_eq!(store.latest_enqueued_at().unwrap(), Some(late.enqueued_at));
    }

    #[test]
    fn test_clear() {
        let mut store = create_test_store();
        store.put(&queued(Action::bookmark_toggle("l1"), "u1", 0)).unwrap();
        store.put(&queued(Action::bookmark_toggle("l2"), "u2", 1)).unwrap();

        assert_eq!(store.clear().unwrap(), 2);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("queue.db");
        let action = queued(Action::note_save("l1", "draft"), "u1", 0);

        {
            let mut store = SqliteActionStore::with_database(Database::open_at(&path).unwrap());
            store.put(&action).unwrap();
        }

        let store = SqliteActionStore::with_database(Database::open_at(&path).unwrap());
        assert_eq!(store.get_all().unwrap(), vec![action]);
    }
}
