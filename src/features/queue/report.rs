//! Queue status snapshots, events, and drain results.

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use super::action::{ActionKind, QueuedAction};
use crate::error::{DeliveryError, DropReason};

/// Snapshot of the queue, recomputed on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    /// Actions waiting for delivery.
    pub pending_count: usize,
    /// Whether a drain pass is running.
    pub is_draining: bool,
    /// When the last drain pass finished.
    pub last_drain_at: Option<DateTime<Utc>>,
    /// Last known connectivity.
    pub is_online: bool,
}

/// Notifications published to queue subscribers.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// The status changed (mutation or connectivity transition).
    StatusChanged(QueueStatus),
    /// An action was acknowledged by the server and removed.
    Delivered {
        action_id: String,
        kind: ActionKind,
    },
    /// An action was removed without delivery. Its data is lost.
    Dropped {
        action: QueuedAction,
        reason: DropReason,
    },
}

/// What happened to one action during a drain pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum DeliveryOutcome {
    /// Delivered and removed.
    Delivered,
    /// Failed; kept for the next pass with the new retry count.
    Retrying {
        retry_count: u32,
        error: String,
    },
    /// Removed without delivery.
    Dropped {
        reason: String,
    },
    /// Not attempted in this pass.
    Skipped,
}

/// Result of delivering one action.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResult {
    pub action_id: String,
    pub kind: ActionKind,
    #[serde(flatten)]
    pub outcome: DeliveryOutcome,
}

/// Result of one drain pass.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    /// Actions acknowledged by the server.
    pub delivered: usize,
    /// Actions that failed and stay queued.
    pub retried: usize,
    /// Actions removed without delivery.
    pub dropped: usize,
    /// Actions not attempted.
    pub skipped: usize,
    /// Individual results, in delivery order.
    pub results: Vec<DeliveryResult>,
}

impl DrainReport {
    /// Record a result.
    pub fn add(&mut self, action: &QueuedAction, outcome: DeliveryOutcome) {
        match &outcome {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::Retrying { .. } => self.retried += 1,
            DeliveryOutcome::Dropped { .. } => self.dropped += 1,
            DeliveryOutcome::Skipped => self.skipped += 1,
        }
        self.results.push(DeliveryResult {
            action_id: action.id.clone(),
            kind: action.kind(),
            outcome,
        });
    }

    /// Record a failed attempt that keeps the action queued.
    pub fn add_retry(&mut self, action: &QueuedAction, error: &DeliveryError) {
        self.add(
            action,
            DeliveryOutcome::Retrying {
                retry_count: action.retry_count,
                error: error.to_string(),
            },
        );
    }

    /// Check if every attempted action was delivered.
    #[must_use]
    pub const fn all_delivered(&self) -> bool {
        self.retried == 0 && self.dropped == 0 && self.skipped == 0
    }

    /// Get total actions in the pass.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.delivered + self.retried + self.dropped + self.skipped
    }
}

/// Format a drain report for display.
#[must_use]
pub fn format_drain_report(report: &DrainReport) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Drain completed: {} actions", report.total()));
    lines.push("─".repeat(40));

    if report.delivered > 0 {
        lines.push(format!(
            "  {} {}",
            "✓".green(),
            format!("{} delivered", report.delivered).green()
        ));
    }

    if report.retried > 0 {
        lines.push(format!(
            "  {} {}",
            "↻".yellow(),
            format!("{} will retry", report.retried).yellow()
        ));
    }

    if report.dropped > 0 {
        lines.push(format!(
            "  {} {}",
            "✗".red(),
            format!("{} dropped (not synced)", report.dropped).red().bold()
        ));
    }

    if report.skipped > 0 {
        lines.push(format!(
            "  {} {}",
            "○".dimmed(),
            format!("{} skipped", report.skipped).dimmed()
        ));
    }

    let failures: Vec<String> = report
        .results
        .iter()
        .filter_map(|r| match &r.outcome {
            DeliveryOutcome::Retrying { error, .. } => Some(format!("  - {}: {error}", r.kind)),
            DeliveryOutcome::Dropped { reason } => {
                Some(format!("  - {}: {}", r.kind, reason.red()))
            },
            DeliveryOutcome::Delivered | DeliveryOutcome::Skipped => None,
        })
        .take(5)
        .collect();

    if !failures.is_empty() {
        lines.push(String::new());
        lines.push("Errors:".to_string());
        lines.extend(failures);
    }

    lines.join("\n")
}
