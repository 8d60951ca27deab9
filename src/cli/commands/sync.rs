//! Sync command implementation.
//!
//! Compares local progress with the server. Nothing here writes.

use colored::Colorize;

use super::Context;
use crate::cli::args::{OutputFormat, SyncCommands};
use crate::error::LearnsyncError;
use crate::features::reconcile::{ResolutionStrategy, SyncFingerprint};
use crate::output::{format_verify, to_json};

/// Execute sync subcommands.
///
/// # Errors
///
/// Returns `SyncFetchFailed` or `SyncVerifyFailed` when the server cannot
/// answer, or an error if local storage cannot be opened.
pub async fn sync(ctx: &Context, cmd: SyncCommands) -> Result<String, LearnsyncError> {
    match cmd {
        SyncCommands::Status => show_status(ctx).await,
        SyncCommands::Verify { remote, strategy } => {
            verify(ctx, remote, strategy.unwrap_or(ctx.config.sync.strategy)).await
        },
    }
}

/// Show the server's status next to the local fingerprint.
async fn show_status(ctx: &Context) -> Result<String, LearnsyncError> {
    let owner = ctx.owner()?;
    let session = ctx.open_session()?;

    let local = session.cache().snapshot(owner)?;
    let local_fingerprint = SyncFingerprint::of(&local);
    let server = session.reconciler().fetch_server_status().await?;
    let matches = local_fingerprint == server.fingerprint;

    match ctx.format {
        OutputFormat::Json => {
            let data = serde_json::json!({
                "owner": owner,
                "localFingerprint": local_fingerprint,
                "localCounts": local.counts(),
                "server": server,
                "fingerprintsMatch": matches,
            });
            to_json(&data)
        },
        OutputFormat::Pretty => {
            let counts = local.counts();
            let mut lines = Vec::new();

            lines.push("Sync Status".bold().to_string());
            lines.push("─".repeat(40));
            lines.push(format!("  Local:      {}", local_fingerprint.short()));
            lines.push(format!("  Server:     {}", server.fingerprint.short()));
            if let Some(modified) = &server.last_modified {
                lines.push(format!("  Modified:   {}", modified.dimmed()));
            }
            lines.push(format!(
                "  Items:      {} local / {} server",
                counts.total(),
                server.item_counts.total()
            ));
            lines.push(String::new());

            if matches {
                lines.push(format!("{} {}", "✓".green(), "Fingerprints match".green()));
            } else {
                lines.push(format!("{} {}", "✗".yellow(), "Fingerprints differ".yellow()));
                lines.push(
                    "Run 'learnsync sync verify' to list conflicts"
                        .dimmed()
                        .to_string(),
                );
            }

            Ok(lines.join("\n"))
        },
    }
}

/// Diff local progress against the server.
async fn verify(
    ctx: &Context,
    remote: bool,
    strategy: ResolutionStrategy,
) -> Result<String, LearnsyncError> {
    let owner = ctx.owner()?;
    let session = ctx.open_session()?;

    let outcome = session.verify(owner, remote).await?;
    format_verify(&outcome, strategy, ctx.format)
}
