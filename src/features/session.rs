//! A signed-in user's sync session.
//!
//! Owns the action queue, the reconciler, and the progress cache, and is
//! the only place that discards queued work (on logout).

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::error::LearnsyncError;
use crate::features::queue::{Action, ActionQueue, ActionSink, ActionStore, DrainReport};
use crate::features::reconcile::{ItemKind, Reconciler, SyncServer, SyncState, VerifyOutcome};
use crate::storage::ProgressCache;

/// Result of one watch iteration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drain: Option<DrainReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify: Option<VerifyOutcome>,
    pub sync_state: SyncState,
}

/// Queue, reconciler, and progress cache for one device.
pub struct Session<S, D, V> {
    queue: ActionQueue<S, D>,
    reconciler: Reconciler<V>,
    cache: ProgressCache,
}

impl<S, D, V> Session<S, D, V>
where
    S: ActionStore + Send,
    D: ActionSink,
    V: SyncServer,
{
    /// Assemble a session from its parts.
    pub fn new(queue: ActionQueue<S, D>, reconciler: Reconciler<V>, cache: ProgressCache) -> Self {
        Self {
            queue,
            reconciler,
            cache,
        }
    }

    pub const fn queue(&self) -> &ActionQueue<S, D> {
        &self.queue
    }

    pub const fn reconciler(&self) -> &Reconciler<V> {
        &self.reconciler
    }

    pub const fn cache(&self) -> &ProgressCache {
        &self.cache
    }

    /// Queue `action` for `owner` and apply it to the local cache.
    ///
    /// The cache is updated only once the action is persisted. A cache
    /// failure after that is logged; the action still goes out.
    ///
    /// # Errors
    ///
    /// Returns `LocalStorageUnavailable` if the action cannot be queued.
    pub async fn record(&self, owner: &str, action: Action) -> Result<String, LearnsyncError> {
        let kind = action.kind().item_kind();
        let target = action.target_id().to_string();
        let toggle = matches!(action, Action::BookmarkToggle(_));

        let id = self.queue.enqueue(action, owner).await?;

        if let Err(e) = self.apply_locally(owner, kind, &target, toggle) {
            tracing::warn!(error = %e, item = %target, "failed to update progress cache");
        }

        Ok(id)
    }

    /// Compare `owner`'s cached progress with the server.
    ///
    /// With `remote`, the server computes the diff.
    ///
    /// # Errors
    ///
    /// Returns `SyncFetchFailed` or `SyncVerifyFailed` from the reconciler, or
    /// a database error if the cache cannot be read.
    pub async fn verify(&self, owner: &str, remote: bool) -> Result<VerifyOutcome, LearnsyncError> {
        let local = self.cache.snapshot(owner)?;
        if remote {
            self.reconciler.verify_remote(&local).await
        } else {
            self.reconciler.verify(&local).await
        }
    }

    /// Discard every queued action and `owner`'s cached progress.
    ///
    /// Returns the number of queued actions discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue or cache cannot be cleared.
    pub fn logout(&self, owner: &str) -> Result<usize, LearnsyncError> {
        let pending = self.queue.status()?.pending_count;
        if pending > 0 {
            tracing::warn!(owner, pending, "logging out with unsynced actions");
        }

        let discarded = self.queue.clear()?;
        let cleared = self.cache.clear_owner(owner)?;
        tracing::info!(owner, discarded, cleared, "session cleared");

        Ok(discarded)
    }

    /// Run one watch iteration: apply connectivity, drain, then verify.
    ///
    /// Reconciliation failures are logged and reflected in `sync_state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the drain hits a storage failure.
    pub async fn tick(&self, owner: &str, online: bool) -> Result<TickReport, LearnsyncError> {
        let mut drain = self.queue.set_online(online).await?;
        if online && drain.is_none() {
            drain = self.queue.drain().await?;
        }

        let verify = if online {
            match self.verify(owner, false).await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    tracing::warn!(error = %e, "verify failed during watch");
                    None
                },
            }
        } else {
            None
        };

        Ok(TickReport {
            online,
            drain,
            verify,
            sync_state: self.reconciler.state(),
        })
    }

    fn apply_locally(
        &self,
        owner: &str,
        kind: ItemKind,
        target: &str,
        toggle: bool,
    ) -> Result<(), LearnsyncError> {
        if toggle && self.cache.contains(owner, kind, target)? {
            self.cache.remove(owner, kind, target)?;
            return Ok(());
        }

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.cache.record(owner, kind, target, &now)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::error::DeliveryError;
    use crate::features::queue::{QueuedAction, RetryPolicy, SqliteActionStore};
    use crate::features::reconcile::{
        compare, ProgressSnapshot, ServerStatus, SyncFingerprint, VerifyRequest,
    };
    use crate::storage::Database;

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<QueuedAction>>,
    }

    #[async_trait]
    impl ActionSink for RecordingSink {
        async fn deliver(&self, action: &QueuedAction) -> Result<(), DeliveryError> {
            self.delivered.lock().push(action.clone());
            Ok(())
        }
    }

    struct StaticServer {
        items: ProgressSnapshot,
    }

    #[async_trait]
    impl SyncServer for StaticServer {
        async fn status(&self) -> Result<ServerStatus, LearnsyncError> {
            Ok(ServerStatus {
                fingerprint: SyncFingerprint::of(&self.items),
                last_modified: None,
                item_counts: self.items.counts(),
            })
        }

        async fn inventory(&self) -> Result<ProgressSnapshot, LearnsyncError> {
            Ok(self.items.clone())
        }

        async fn verify(&self, request: &VerifyRequest) -> Result<VerifyOutcome, LearnsyncError> {
            Ok(compare(&request.items, &self.items, self.status().await?))
        }
    }

    type TestSession = Session<SqliteActionStore, RecordingSink, StaticServer>;

    fn create_test_session(server_items: ProgressSnapshot) -> TestSession {
        let store = SqliteActionStore::with_database(Database::open_in_memory().unwrap());
        let queue =
            ActionQueue::new(store, RecordingSink::default(), RetryPolicy::default()).unwrap();
        let reconciler = Reconciler::new(StaticServer {
            items: server_items,
        });
        let cache = ProgressCache::with_database(Database::open_in_memory().unwrap());
        Session::new(queue, reconciler, cache)
    }

    #[tokio::test]
    async fn test_record_updates_cache_and_queue() {
        let session = create_test_session(ProgressSnapshot::default());

        session.record("u1", Action::lesson_complete("l1", None)).await.unwrap();

        assert!(session.cache().contains("u1", ItemKind::Completion, "l1").unwrap());
        assert_eq!(session.queue().pending_actions("u1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bookmark_toggle_flips_cache() {
        let session = create_test_session(ProgressSnapshot::default());

        session.record("u1", Action::bookmark_toggle("l1")).await.unwrap();
        assert!(session.cache().contains("u1", ItemKind::Bookmark, "l1").unwrap());

        session.record("u1", Action::bookmark_toggle("l1")).await.unwrap();
        assert!(!session.cache().contains("u1", ItemKind::Bookmark, "l1").unwrap());
        assert_eq!(session.queue().pending_actions("u1").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_verify_reports_unsynced_local_items() {
        let session = create_test_session(ProgressSnapshot::default());
        session.record("u1", Action::note_save("l1", "draft")).await.unwrap();

        let outcome = session.verify("u1", false).await.unwrap();

        assert!(!outcome.in_sync);
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].item_kind, ItemKind::Note);
    }

    #[tokio::test]
    async fn test_logout_discards_queue_and_cache() {
        let session = create_test_session(ProgressSnapshot::default());
        session.record("u1", Action::lesson_complete("l1", None)).await.unwrap();
        session.record("u1", Action::bookmark_toggle("l2")).await.unwrap();

        let discarded = session.logout("u1").unwrap();

        assert_eq!(discarded, 2);
        assert_eq!(session.queue().status().unwrap().pending_count, 0);
        assert_eq!(session.cache().snapshot("u1").unwrap().counts().total(), 0);
    }

    #[tokio::test]
    async fn test_tick_offline_only_records_connectivity() {
        let session = create_test_session(ProgressSnapshot::default());
        session.record("u1", Action::bookmark_toggle("l1")).await.unwrap();

        let report = session.tick("u1", false).await.unwrap();

        assert!(!report.online);
        assert!(report.drain.is_none());
        assert!(report.verify.is_none());
        assert_eq!(report.sync_state, SyncState::Unknown);
        assert_eq!(session.queue().status().unwrap().pending_count, 1);
    }

    #[tokio::test]
    async fn test_tick_online_drains_and_verifies() {
        let session = create_test_session(ProgressSnapshot::default());
        session.record("u1", Action::bookmark_toggle("l1")).await.unwrap();

        let first = session.tick("u1", true).await.unwrap();
        assert_eq!(first.drain.as_ref().map(|d| d.delivered), Some(1));
        assert!(first.verify.is_some());

        // Online enqueue delivers at once; the tick still runs a pass
        session.record("u1", Action::bookmark_toggle("l2")).await.unwrap();
        let second = session.tick("u1", true).await.unwrap();
        assert!(second.drain.is_some());
        assert_eq!(session.queue().sink().delivered.lock().len(), 2);
    }
}
