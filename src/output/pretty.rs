use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::features::queue::QueuedAction;
use crate::features::reconcile::{
    resolve_conflict, ConflictKind, Resolution, ResolutionStrategy, VerifyOutcome,
};

/// Format queued actions as a table
pub fn format_actions_pretty(actions: &[QueuedAction], owner: &str) -> String {
    if actions.is_empty() {
        return format!("Queued actions for {owner} (0)\n  Nothing waiting to sync");
    }

    let mut lines = Vec::new();
    lines.push(format!("Queued actions for {owner} ({})", actions.len()));
    lines.push("─".repeat(70));
    lines.push(format!(
        "{:<10} {:<16} {:<20} {:<12} {}",
        "ID", "Kind", "Target", "Queued", "Retries"
    ));
    lines.push("─".repeat(70));

    for action in actions {
        let retries = match action.retry_count {
            0 => "0".dimmed(),
            n => n.to_string().yellow(),
        };
        lines.push(format!(
            "{:<10} {:<16} {:<20} {:<12} {}",
            short_id(&action.id),
            action.kind().display_name(),
            truncate(action.action.target_id(), 20),
            format_age(action.enqueued_at, Utc::now()),
            retries
        ));
    }

    lines.join("\n")
}

/// Format a verify outcome with the suggested resolution per conflict
pub fn format_verify_pretty(outcome: &VerifyOutcome, strategy: ResolutionStrategy) -> String {
    let mut lines = Vec::new();

    if outcome.in_sync {
        lines.push(format!("{} {}", "✓".green(), "In sync with server".green().bold()));
    } else {
        lines.push(format!(
            "{} {}",
            "✗".red(),
            format!("Out of sync: {} conflicts", outcome.conflicts.len())
                .red()
                .bold()
        ));
    }
    lines.push(format!(
        "  Server fingerprint: {}",
        outcome.server_status.fingerprint.short().dimmed()
    ));
    if let Some(modified) = &outcome.server_status.last_modified {
        lines.push(format!("  Last modified:      {}", modified.dimmed()));
    }

    if outcome.conflicts.is_empty() {
        if !outcome.in_sync {
            lines.push(
                "  Fingerprints differ but the inventories match; try again shortly"
                    .yellow()
                    .to_string(),
            );
        }
        return lines.join("\n");
    }

    lines.push(String::new());
    lines.push(format!(
        "{:<14} {:<20} {:<19} {:<22} {:<22} {}",
        "Kind", "Item", "Conflict", "Client", "Server", format!("Resolution ({strategy})")
    ));
    lines.push("─".repeat(110));

    for conflict in &outcome.conflicts {
        let kind = match conflict.kind {
            ConflictKind::MissingOnServer => conflict.kind.to_string().yellow(),
            ConflictKind::MissingOnClient => conflict.kind.to_string().cyan(),
            ConflictKind::TimestampMismatch => conflict.kind.to_string().red(),
        };
        let resolution = match resolve_conflict(conflict, strategy) {
            Resolution::UseClient => "use client".green(),
            Resolution::UseServer => "use server".blue(),
            Resolution::Manual => "manual".yellow(),
        };

        lines.push(format!(
            "{:<14} {:<20} {:<19} {:<22} {:<22} {}",
            conflict.item_kind.display_name(),
            truncate(&conflict.item_id, 20),
            kind,
            conflict.client_timestamp.as_deref().unwrap_or("-"),
            conflict.server_timestamp.as_deref().unwrap_or("-"),
            resolution
        ));
    }

    lines.join("\n")
}

/// Human-readable age of `time` relative to `now`
pub fn format_age(time: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(time);
    if age.num_days() > 0 {
        format!("{}d ago", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{}h ago", age.num_hours())
    } else if age.num_minutes() > 0 {
        format!("{}m ago", age.num_minutes())
    } else {
        "just now".to_string()
    }
}

/// First eight characters of an action id
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
        out.push_str("...");
        out
    } else {
        s.to_string()
    }
}
