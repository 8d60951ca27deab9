//! Watch and logout commands.

use std::time::Duration;

use chrono::Local;
use colored::Colorize;

use super::Context;
use crate::cli::args::{OutputFormat, WatchArgs};
use crate::error::LearnsyncError;
use crate::features::TickReport;
use crate::output::to_json;

/// Probe, drain, and verify on an interval until Ctrl-C or the iteration limit.
///
/// Each iteration is printed as it completes; the returned string is the
/// closing summary.
///
/// # Errors
///
/// Returns an error if local storage fails. Network failures are reported
/// per iteration and do not stop the loop.
pub async fn watch(ctx: &Context, args: &WatchArgs) -> Result<String, LearnsyncError> {
    let owner = ctx.owner()?;
    let session = ctx.open_session()?;
    let interval_secs = args.interval.unwrap_or(ctx.config.sync.interval_secs).max(1);
    let interval = Duration::from_secs(interval_secs);

    tracing::info!(owner, interval_secs = interval.as_secs(), "watch started");

    let mut completed = 0u32;
    loop {
        let online = session.queue().sink().probe().await;
        let report = session.tick(owner, online).await?;
        println!("{}", format_tick(&report, ctx.format)?);

        completed += 1;
        if args.iterations.is_some_and(|limit| completed >= limit) {
            break;
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            () = tokio::time::sleep(interval) => {},
        }
    }

    let pending = session.queue().status()?.pending_count;
    match ctx.format {
        OutputFormat::Json => Ok(String::new()),
        OutputFormat::Pretty => Ok(format!(
            "Watch stopped after {completed} iterations; {pending} actions pending"
        )
        .dimmed()
        .to_string()),
    }
}

fn format_tick(report: &TickReport, format: OutputFormat) -> Result<String, LearnsyncError> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string(report)?);
    }

    let time = Local::now().format("%H:%M:%S").to_string().dimmed();
    if !report.online {
        return Ok(format!("{time} {}", "offline".yellow()));
    }

    let delivered = report.drain.as_ref().map_or(0, |d| d.delivered);
    let failed = report
        .drain
        .as_ref()
        .map_or(0, |d| d.retried + d.dropped);
    let sync = match &report.verify {
        Some(outcome) if outcome.in_sync => "in sync".green(),
        Some(outcome) => format!("{} conflicts", outcome.conflicts.len()).red(),
        None => report.sync_state.label().yellow(),
    };

    let mut line = format!("{time} {} delivered {delivered}", "online".green());
    if failed > 0 {
        line.push_str(&format!(", {}", format!("{failed} failed").red()));
    }
    line.push_str(&format!(" | {sync}"));
    Ok(line)
}

/// Clear the local session: discard queued actions and cached progress.
///
/// # Errors
///
/// Returns `Config` without `--force`, or an error if storage fails.
pub fn logout(ctx: &Context, force: bool) -> Result<String, LearnsyncError> {
    let owner = ctx.owner()?;
    let session = ctx.open_session()?;

    if !force {
        let pending = session.queue().status()?.pending_count;
        return Err(LearnsyncError::Config(format!(
            "Use --force to log out ({pending} unsynced actions will be discarded)"
        )));
    }

    let discarded = session.logout(owner)?;

    match ctx.format {
        OutputFormat::Json => to_json(&serde_json::json!({
            "owner": owner,
            "discarded": discarded,
        })),
        OutputFormat::Pretty => {
            let mut line = format!("Logged out {owner}");
            if discarded > 0 {
                line.push_str(&format!(
                    "; {}",
                    format!("discarded {discarded} unsynced actions").yellow()
                ));
            }
            Ok(line)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::queue::DrainReport;
    use crate::features::reconcile::SyncState;

    #[test]
    fn test_format_tick_offline() {
        colored::control::set_override(false);
        let report = TickReport {
            online: false,
            drain: None,
            verify: None,
            sync_state: SyncState::Unknown,
        };
        assert!(format_tick(&report, OutputFormat::Pretty).unwrap().ends_with("offline"));
    }

    #[test]
    fn test_format_tick_online() {
        colored::control::set_override(false);
        let report = TickReport {
            online: true,
            drain: Some(DrainReport {
                delivered: 2,
                retried: 1,
                ..DrainReport::default()
            }),
            verify: None,
            sync_state: SyncState::Error {
                message: "down".to_string(),
            },
        };

        let line = format_tick(&report, OutputFormat::Pretty).unwrap();
        assert!(line.contains("delivered 2, 1 failed | error"));
    }

    #[test]
    fn test_format_tick_json() {
        let report = TickReport {
            online: false,
            drain: None,
            verify: None,
            sync_state: SyncState::Unknown,
        };
        let json: serde_json::Value =
            serde_json::from_str(&format_tick(&report, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["online"], false);
        assert_eq!(json["syncState"]["state"], "unknown");
    }
}
