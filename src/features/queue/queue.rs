//! The durable action queue and its drain loop.
//!
//! Actions are persisted before anything else happens to them and leave the
//! store exactly once: when the server acknowledges them, or when they are
//! dropped with a published [`QueueEvent::Dropped`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::action::{Action, QueuedAction};
use super::report::{DeliveryOutcome, DrainReport, QueueEvent, QueueStatus};
use super::store::ActionStore;
use crate::error::{DeliveryError, DropReason, LearnsyncError};

/// Failed attempts tolerated before an action is dropped.
pub const MAX_RETRIES: u32 = 3;

const EVENT_CAPACITY: usize = 64;

/// Delivers a queued action to its server route.
#[async_trait]
pub trait ActionSink: Send + Sync {
    /// Submit one action. `Ok` means the server acknowledged it.
    async fn deliver(&self, action: &QueuedAction) -> Result<(), DeliveryError>;
}

/// Retry behaviour of the drain loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed attempts tolerated before an action is dropped.
    pub max_retries: u32,
    /// Treat 4xx rejections as transient instead of dropping them at once.
    pub retry_client_errors: bool,
    /// Skip the rest of a pass after the first failure.
    pub stop_on_failure: bool,
    /// Deadline for a single delivery attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            retry_client_errors: false,
            stop_on_failure: false,
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// Clears the draining flag when a pass ends, however it ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Persistent queue of user actions awaiting server acknowledgement.
///
/// At most one drain runs at a time; actions are delivered one by one in
/// `enqueued_at` order. The queue starts offline.
pub struct ActionQueue<S, D> {
    store: Mutex<S>,
    sink: D,
    policy: RetryPolicy,
    online: AtomicBool,
    draining: AtomicBool,
    last_drain_at: Mutex<Option<DateTime<Utc>>>,
    last_enqueued_at: Mutex<Option<DateTime<Utc>>>,
    events: broadcast::Sender<QueueEvent>,
}

impl<S, D> ActionQueue<S, D>
where
    S: ActionStore + Send,
    D: ActionSink,
{
    /// Create a queue over `store`, delivering through `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn new(store: S, sink: D, policy: RetryPolicy) -> Result<Self, LearnsyncError> {
        let last_enqueued_at = store.latest_enqueued_at()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            store: Mutex::new(store),
            sink,
            policy,
            online: AtomicBool::new(false),
            draining: AtomicBool::new(false),
            last_drain_at: Mutex::new(None),
            last_enqueued_at: Mutex::new(last_enqueued_at),
            events,
        })
    }

    /// The delivery sink.
    pub const fn sink(&self) -> &D {
        &self.sink
    }

    /// Receive status snapshots and delivery events.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Last known connectivity.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Current status.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn status(&self) -> Result<QueueStatus, LearnsyncError> {
        let pending_count = self.store.lock().count()?;
        Ok(QueueStatus {
            pending_count,
            is_draining: self.draining.load(Ordering::SeqCst),
            last_drain_at: *self.last_drain_at.lock(),
            is_online: self.is_online(),
        })
    }

    /// Queued actions created by `owner`, in delivery order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn pending_actions(&self, owner: &str) -> Result<Vec<QueuedAction>, LearnsyncError> {
        self.store.lock().get_by_owner(owner)
    }

    /// Record a connectivity change.
    ///
    /// Going online starts a drain; the report of that drain is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the triggered drain hits a storage failure.
    pub async fn set_online(&self, online: bool) -> Result<Option<DrainReport>, LearnsyncError> {
        if self.record_connectivity(online) {
            self.drain().await
        } else {
            Ok(None)
        }
    }

    /// Record connectivity without draining.
    ///
    /// Returns `true` when this came back online.
    pub fn record_connectivity(&self, online: bool) -> bool {
        if self.online.swap(online, Ordering::SeqCst) == online {
            return false;
        }

        tracing::info!(online, "connectivity changed");
        self.publish_status();
        online
    }

    /// Persist a new action and return its id.
    ///
    /// When online and idle, a drain runs before this returns. Failures of
    /// that drain are logged; the action itself is already safe.
    ///
    /// # Errors
    ///
    /// Returns `LocalStorageUnavailable` if the action cannot be persisted.
    pub async fn enqueue(&self, action: Action, owner: &str) -> Result<String, LearnsyncError> {
        let queued = QueuedAction::new(action, owner, self.next_timestamp());

        self.store.lock().put(&queued).map_err(|e| match e {
            LearnsyncError::LocalStorageUnavailable(_) => e,
            other => LearnsyncError::LocalStorageUnavailable(other.to_string()),
        })?;

        tracing::debug!(id = %queued.id, kind = %queued.kind(), owner, "action queued");
        self.publish_status();

        if self.is_online() {
            if let Err(e) = self.drain().await {
                tracing::warn!(error = %e, "drain after enqueue failed");
            }
        }

        Ok(queued.id)
    }

    /// Deliver every queued action once, in order.
    ///
    /// Returns `None` without doing anything when offline or when another
    /// drain is in flight. Actions queued during the pass wait for the next
    /// one.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails; actions already handled keep
    /// their new state. The pass still ends with a published status.
    pub async fn drain(&self) -> Result<Option<DrainReport>, LearnsyncError> {
        if !self.is_online() {
            tracing::debug!("drain skipped: offline");
            return Ok(None);
        }

        let Some(guard) = self.try_begin_drain() else {
            tracing::debug!("drain skipped: already draining");
            return Ok(None);
        };
        self.publish_status();

        let result = self.run_pass().await;

        *self.last_drain_at.lock() = Some(Utc::now());
        drop(guard);
        self.publish_status();

        let report = result?;
        tracing::info!(
            delivered = report.delivered,
            retried = report.retried,
            dropped = report.dropped,
            skipped = report.skipped,
            "drain finished"
        );

        Ok(Some(report))
    }

    /// Reset every retry count to zero and drain again.
    ///
    /// # Errors
    ///
    /// Returns `OfflineRetryRejected` when offline, without touching the store.
    pub async fn retry_all(&self) -> Result<Option<DrainReport>, LearnsyncError> {
        if !self.is_online() {
            return Err(LearnsyncError::OfflineRetryRejected);
        }

        {
            let mut store = self.store.lock();
            for mut action in store.get_all()? {
                if action.retry_count > 0 {
                    action.retry_count = 0;
                    store.put(&action)?;
                }
            }
        }

        self.drain().await
    }

    /// Discard every queued action. Unsynced work is lost.
    pub(crate) fn clear(&self) -> Result<usize, LearnsyncError> {
        let removed = self.store.lock().clear()?;
        if removed > 0 {
            tracing::warn!(removed, "discarded unsynced actions");
        }
        self.publish_status();
        Ok(removed)
    }

    async fn run_pass(&self) -> Result<DrainReport, LearnsyncError> {
        let snapshot = self.store.lock().get_all()?;
        tracing::info!(count = snapshot.len(), "draining queue");

        let mut report = DrainReport::default();
        let mut halted = false;

        for action in snapshot {
            if halted || !self.is_online() {
                report.add(&action, DeliveryOutcome::Skipped);
                continue;
            }

            match self.attempt(&action).await {
                Ok(()) => self.complete(action, &mut report)?,
                Err(error) => {
                    halted = self.policy.stop_on_failure;
                    self.handle_failure(action, error, &mut report)?;
                },
            }
        }

        Ok(report)
    }

    async fn attempt(&self, action: &QueuedAction) -> Result<(), DeliveryError> {
        match tokio::time::timeout(self.policy.attempt_timeout, self.sink.deliver(action)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout),
        }
    }

    fn complete(
        &self,
        action: QueuedAction,
        report: &mut DrainReport,
    ) -> Result<(), LearnsyncError> {
        self.store.lock().delete(&action.id)?;
        tracing::debug!(id = %action.id, kind = %action.kind(), "action delivered");
        report.add(&action, DeliveryOutcome::Delivered);
        let _ = self.events.send(QueueEvent::Delivered {
            action_id: action.id,
            kind: action.action.kind(),
        });
        Ok(())
    }

    fn handle_failure(
        &self,
        mut action: QueuedAction,
        error: DeliveryError,
        report: &mut DrainReport,
    ) -> Result<(), LearnsyncError> {
        if let DeliveryError::Status { code, .. } = error {
            if !error.is_retryable() && !self.policy.retry_client_errors {
                return self.drop_action(action, DropReason::Rejected { code }, report);
            }
        }

        if action.retry_count < self.policy.max_retries {
            action.retry_count += 1;
            self.store.lock().put(&action)?;
            tracing::warn!(
                id = %action.id,
                kind = %action.kind(),
                retry_count = action.retry_count,
                error = %error,
                "delivery failed, will retry"
            );
            report.add_retry(&action, &error);
            return Ok(());
        }

        let attempts = action.retry_count + 1;
        self.drop_action(
            action,
            DropReason::RetryCeilingExceeded {
                attempts,
                last_error: error,
            },
            report,
        )
    }

    fn drop_action(
        &self,
        action: QueuedAction,
        reason: DropReason,
        report: &mut DrainReport,
    ) -> Result<(), LearnsyncError> {
        self.store.lock().delete(&action.id)?;
        tracing::error!(
            id = %action.id,
            kind = %action.kind(),
            owner = %action.owner,
            reason = %reason,
            "action dropped without delivery"
        );
        report.add(
            &action,
            DeliveryOutcome::Dropped {
                reason: reason.to_string(),
            },
        );
        let _ = self.events.send(QueueEvent::Dropped { action, reason });
        Ok(())
    }

    fn try_begin_drain(&self) -> Option<DrainGuard<'_>> {
        self.draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| DrainGuard(&self.draining))
    }

    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(6);
        let mut last = self.last_enqueued_at.lock();
        let next = last.map_or(now, |prev| prev.max(now));
        *last = Some(next);
        next
    }

    fn publish_status(&self) {
        match self.status() {
            Ok(status) => {
                let _ = self.events.send(QueueEvent::StatusChanged(status));
            },
            Err(e) => tracing::warn!(error = %e, "failed to compute queue status"),
        }
    }
}
