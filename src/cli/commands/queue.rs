//! Queue command implementation.
//!
//! Records actions and manages the durable action queue.

use std::collections::BTreeMap;

use chrono::Utc;
use colored::Colorize;
use serde::Serialize;

use super::{AppSession, Context};
use crate::cli::args::{OutputFormat, QueueCommands};
use crate::error::LearnsyncError;
use crate::features::queue::{format_drain_report, Action, DrainReport, QueueStatus, QueuedAction};
use crate::output::{format_actions, format_age, short_id, to_json};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Recorded<'a> {
    id: &'a str,
    kind: &'a str,
    owner: &'a str,
    online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    drain: Option<&'a DrainReport>,
}

/// Execute queue subcommands.
///
/// # Errors
///
/// Returns an error if the queue cannot be opened or the command fails.
pub async fn queue(ctx: &Context, cmd: QueueCommands) -> Result<String, LearnsyncError> {
    let session = ctx.open_session()?;

    match cmd {
        QueueCommands::Complete {
            lesson_id,
            time_spent,
            delivery,
        } => {
            let action = Action::lesson_complete(lesson_id, time_spent);
            record(ctx, &session, action, delivery.offline).await
        },
        QueueCommands::Quiz {
            quiz_id,
            answers,
            score,
            delivery,
        } => {
            let answers: BTreeMap<_, _> = answers.into_iter().collect();
            let action = Action::quiz_submit(quiz_id, answers, score)?;
            record(ctx, &session, action, delivery.offline).await
        },
        QueueCommands::Bookmark {
            lesson_id,
            delivery,
        } => record(ctx, &session, Action::bookmark_toggle(lesson_id), delivery.offline).await,
        QueueCommands::Note {
            lesson_id,
            content,
            delivery,
        } => {
            let action = Action::note_save(lesson_id, content);
            record(ctx, &session, action, delivery.offline).await
        },
        QueueCommands::Status => show_status(ctx, &session),
        QueueCommands::List { limit } => list_actions(ctx, &session, limit),
        QueueCommands::Drain => drain(ctx, &session).await,
        QueueCommands::Retry => retry(ctx, &session).await,
    }
}

/// Queue an action, then deliver it unless told to stay offline.
async fn record(
    ctx: &Context,
    session: &AppSession,
    action: Action,
    offline: bool,
) -> Result<String, LearnsyncError> {
    let owner = ctx.owner()?;
    let kind = action.kind();
    let id = session.record(owner, action).await?;

    let drain = if offline {
        None
    } else {
        let online = session.queue().sink().probe().await;
        session.queue().set_online(online).await?
    };
    let online = session.queue().is_online();

    match ctx.format {
        OutputFormat::Json => to_json(&Recorded {
            id: &id,
            kind: kind.as_str(),
            owner,
            online,
            drain: drain.as_ref(),
        }),
        OutputFormat::Pretty => {
            let mut lines = vec![format!(
                "{} Queued {} ({})",
                "✓".green(),
                kind.display_name().bold(),
                short_id(&id).dimmed()
            )];

            match &drain {
                Some(report) => lines.push(format_drain_report(report)),
                None if offline => {
                    lines.push(
                        "  Saved offline; it will sync on the next drain"
                            .dimmed()
                            .to_string(),
                    );
                },
                None => lines.push(
                    format!(
                        "  Server unreachable at {}; will sync later",
                        ctx.config.server.base_url
                    )
                    .yellow()
                    .to_string(),
                ),
            }

            Ok(lines.join("\n"))
        },
    }
}

/// Show queue status.
fn show_status(ctx: &Context, session: &AppSession) -> Result<String, LearnsyncError> {
    let status = session.queue().status()?;
    let mine = match ctx.user.as_deref() {
        Some(owner) => Some((owner, session.queue().pending_actions(owner)?)),
        None => None,
    };

    match ctx.format {
        OutputFormat::Json => {
            let actions = mine.as_ref().map(|(_, actions)| actions.as_slice());
            let data = serde_json::json!({
                "pendingCount": status.pending_count,
                "owner": mine.as_ref().map(|(owner, _)| owner),
                "ownerPending": actions.map(<[QueuedAction]>::len),
                "retrying": actions.map(|a| a.iter().filter(|a| a.retry_count > 0).count()),
                "oldestPending": actions
                    .and_then(<[QueuedAction]>::first)
                    .map(|a| a.enqueued_at.to_rfc3339()),
            });
            to_json(&data)
        },
        OutputFormat::Pretty => Ok(format_status_pretty(&status, mine.as_ref())),
    }
}

fn format_status_pretty(
    status: &QueueStatus,
    mine: Option<&(&str, Vec<QueuedAction>)>,
) -> String {
    let mut lines = Vec::new();

    lines.push("Action Queue Status".bold().to_string());
    lines.push("─".repeat(40));
    lines.push(format!(
        "  Pending:    {} {}",
        status.pending_count,
        if status.pending_count > 0 {
            "actions waiting".dimmed()
        } else {
            "".dimmed()
        }
    ));

    if let Some((owner, actions)) = mine {
        let retrying = actions.iter().filter(|a| a.retry_count > 0).count();
        lines.push(format!("  For {owner}:   {}", actions.len()));
        lines.push(format!(
            "  Retrying:   {} {}",
            retrying,
            if retrying > 0 {
                "failed at least once".yellow()
            } else {
                "".normal()
            }
        ));
        if let Some(oldest) = actions.first() {
            lines.push(format!(
                "  Oldest:     {}",
                format_age(oldest.enqueued_at, Utc::now()).dimmed()
            ));
        }
    }

    if status.pending_count > 0 {
        lines.push(String::new());
        lines.push(
            "Run 'learnsync queue drain' to deliver pending actions"
                .dimmed()
                .to_string(),
        );
    }

    lines.join("\n")
}

/// List the user's queued actions.
fn list_actions(
    ctx: &Context,
    session: &AppSession,
    limit: usize,
) -> Result<String, LearnsyncError> {
    let owner = ctx.owner()?;
    let mut actions = session.queue().pending_actions(owner)?;
    actions.truncate(limit);
    format_actions(&actions, owner, ctx.format)
}

/// Deliver queued actions now.
async fn drain(ctx: &Context, session: &AppSession) -> Result<String, LearnsyncError> {
    let online = session.queue().sink().probe().await;
    let report = session.queue().set_online(online).await?;
    format_drain_outcome(ctx, session, report)
}

/// Reset retry counts and deliver again.
async fn retry(ctx: &Context, session: &AppSession) -> Result<String, LearnsyncError> {
    let online = session.queue().sink().probe().await;
    session.queue().record_connectivity(online);
    let report = session.queue().retry_all().await?;
    format_drain_outcome(ctx, session, report)
}

fn format_drain_outcome(
    ctx: &Context,
    session: &AppSession,
    report: Option<DrainReport>,
) -> Result<String, LearnsyncError> {
    let status = session.queue().status()?;

    match ctx.format {
        OutputFormat::Json => {
            let data = serde_json::json!({
                "online": status.is_online,
                "pendingCount": status.pending_count,
                "report": report,
            });
            to_json(&data)
        },
        OutputFormat::Pretty => match report {
            None if !status.is_online => Ok(format!(
                "{} {} actions remain queued",
                "Offline:".yellow().bold(),
                status.pending_count
            )),
            Some(report) if report.total() > 0 => Ok(format_drain_report(&report)),
            _ => Ok("No pending actions to deliver.".to_string()),
        },
    }
}
