//! Output formatting for learnsync.
//!
//! This module provides formatters for queued actions and reconciliation
//! results in the supported output formats.

mod json;
mod pretty;

use crate::cli::args::OutputFormat;
use crate::error::LearnsyncError;
use crate::features::queue::QueuedAction;
use crate::features::reconcile::{ResolutionStrategy, VerifyOutcome};

pub use json::*;
pub use pretty::*;

/// Format queued actions based on output format
///
/// # Errors
///
/// Returns `LearnsyncError::Parse` if JSON serialization fails.
pub fn format_actions(
    actions: &[QueuedAction],
    owner: &str,
    format: OutputFormat,
) -> Result<String, LearnsyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_actions_pretty(actions, owner)),
        OutputFormat::Json => format_actions_json(actions, owner),
    }
}

/// Format a verify outcome based on output format
///
/// # Errors
///
/// Returns `LearnsyncError::Parse` if JSON serialization fails.
pub fn format_verify(
    outcome: &VerifyOutcome,
    strategy: ResolutionStrategy,
    format: OutputFormat,
) -> Result<String, LearnsyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_verify_pretty(outcome, strategy)),
        OutputFormat::Json => format_verify_json(outcome, strategy),
    }
}
