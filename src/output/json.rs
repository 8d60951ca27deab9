//! JSON output formatting for learnsync.

use serde::Serialize;
use serde_json::json;

use crate::error::LearnsyncError;
use crate::features::queue::QueuedAction;
use crate::features::reconcile::{resolve_conflict, ResolutionStrategy, VerifyOutcome};

/// Format queued actions as JSON
///
/// # Errors
///
/// Returns `LearnsyncError::Parse` if JSON serialization fails.
pub fn format_actions_json(
    actions: &[QueuedAction],
    owner: &str,
) -> Result<String, LearnsyncError> {
    let output = json!({
        "owner": owner,
        "count": actions.len(),
        "items": actions
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format a verify outcome as JSON, with the suggested resolution per conflict
///
/// # Errors
///
/// Returns `LearnsyncError::Parse` if JSON serialization fails.
pub fn format_verify_json(
    outcome: &VerifyOutcome,
    strategy: ResolutionStrategy,
) -> Result<String, LearnsyncError> {
    let conflicts: Vec<_> = outcome
        .conflicts
        .iter()
        .map(|conflict| {
            json!({
                "itemKind": conflict.item_kind,
                "itemId": conflict.item_id,
                "clientTimestamp": conflict.client_timestamp,
                "serverTimestamp": conflict.server_timestamp,
                "kind": conflict.kind,
                "resolution": resolve_conflict(conflict, strategy),
            })
        })
        .collect();

    let output = json!({
        "inSync": outcome.in_sync,
        "strategy": strategy,
        "conflicts": conflicts,
        "serverStatus": outcome.server_status,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Serialize any value to pretty JSON
///
/// # Errors
///
/// Returns `LearnsyncError::Parse` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, LearnsyncError> {
    Ok(serde_json::to_string_pretty(value)?)
}
