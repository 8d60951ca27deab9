//! Conflict detection between a local and a server inventory.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::fingerprint::SyncFingerprint;
use super::item::{ItemKind, ProgressSnapshot, SyncItem};
use super::reconciler::{ServerStatus, VerifyOutcome};

/// How one item diverges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictKind {
    /// Known locally, absent on the server.
    MissingOnServer,
    /// Known to the server, absent locally.
    MissingOnClient,
    /// Known to both with different timestamps.
    TimestampMismatch,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MissingOnServer => "missing on server",
            Self::MissingOnClient => "missing on client",
            Self::TimestampMismatch => "timestamp mismatch",
        };
        write!(f, "{s}")
    }
}

/// A single detected divergence for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub item_kind: ItemKind,
    pub item_id: String,
    /// Local timestamp, absent for [`ConflictKind::MissingOnClient`].
    #[serde(default)]
    pub client_timestamp: Option<String>,
    /// Server timestamp, absent for [`ConflictKind::MissingOnServer`].
    #[serde(default)]
    pub server_timestamp: Option<String>,
    pub kind: ConflictKind,
}

/// Full outer join of two inventories keyed by item id within each kind.
///
/// Conflicts are grouped by kind in [`ItemKind::ALL`] order. Within a kind,
/// local items come first in local order, followed by unmatched server items
/// in server order. Items present on both sides with equal timestamps are not
/// conflicts. Repeated ids are paired entry by entry, so an extra server
/// entry for a known id is reported as [`ConflictKind::MissingOnClient`].
/// The result is empty exactly when both sides fingerprint the same.
#[must_use]
pub fn detect_conflicts(local: &ProgressSnapshot, server: &ProgressSnapshot) -> Vec<Conflict> {
    ItemKind::ALL
        .iter()
        .flat_map(|kind| diff_kind(*kind, local.items(*kind), server.items(*kind)))
        .collect()
}

fn diff_kind(kind: ItemKind, local: &[SyncItem], server: &[SyncItem]) -> Vec<Conflict> {
    let mut server_by_id: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, item) in server.iter().enumerate() {
        server_by_id.entry(item.id.as_str()).or_default().push(index);
    }
    let mut claimed = vec![false; server.len()];

    // Exact matches are claimed before any entry is paired as a mismatch.
    let matched: Vec<bool> = local
        .iter()
        .map(|item| {
            claim(&server_by_id, &mut claimed, &item.id, |index| {
                server[index].timestamp == item.timestamp
            })
            .is_some()
        })
        .collect();

    let mut conflicts = Vec::new();
    for (item, _) in local.iter().zip(matched).filter(|(_, matched)| !matched) {
        match claim(&server_by_id, &mut claimed, &item.id, |_| true) {
            Some(index) => conflicts.push(Conflict {
                item_kind: kind,
                item_id: item.id.clone(),
                client_timestamp: Some(item.timestamp.clone()),
                server_timestamp: Some(server[index].timestamp.clone()),
                kind: ConflictKind::TimestampMismatch,
            }),
            None => conflicts.push(Conflict {
                item_kind: kind,
                item_id: item.id.clone(),
                client_timestamp: Some(item.timestamp.clone()),
                server_timestamp: None,
                kind: ConflictKind::MissingOnServer,
            }),
        }
    }

    for (item, _) in server.iter().zip(claimed).filter(|(_, claimed)| !claimed) {
        conflicts.push(Conflict {
            item_kind: kind,
            item_id: item.id.clone(),
            client_timestamp: None,
            server_timestamp: Some(item.timestamp.clone()),
            kind: ConflictKind::MissingOnClient,
        });
    }

    conflicts
}

/// Claim the first unclaimed server entry for `id` accepted by `accept`.
fn claim(
    server_by_id: &HashMap<&str, Vec<usize>>,
    claimed: &mut [bool],
    id: &str,
    accept: impl Fn(usize) -> bool,
) -> Option<usize> {
    let index = server_by_id
        .get(id)?
        .iter()
        .copied()
        .find(|&index| !claimed[index] && accept(index))?;
    claimed[index] = true;
    Some(index)
}

/// Compare a local inventory with the server's.
///
/// Takes the cheap path when the fingerprints already match. Differing
/// fingerprints are never reported in sync, even if the inventory diff is
/// empty.
#[must_use]
pub fn compare(
    local: &ProgressSnapshot,
    server: &ProgressSnapshot,
    server_status: ServerStatus,
) -> VerifyOutcome {
    if SyncFingerprint::of(local) == server_status.fingerprint {
        return VerifyOutcome {
            in_sync: true,
            conflicts: Vec::new(),
            server_status,
        };
    }

    VerifyOutcome {
        in_sync: false,
        conflicts: detect_conflicts(local, server),
        server_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completions(items: &[(&str, &str)]) -> ProgressSnapshot {
        ProgressSnapshot {
            completions: items.iter().map(|(id, t)| SyncItem::new(*id, *t)).collect(),
            ..ProgressSnapshot::default()
        }
    }

    fn status_of(snapshot: &ProgressSnapshot) -> ServerStatus {
        ServerStatus {
            fingerprint: SyncFingerprint::of(snapshot),
            last_modified: None,
            item_counts: snapshot.counts(),
        }
    }

    #[test]
    fn test_identical_sets_in_sync() {
        let local = completions(&[("l1", "2024-01-01"), ("l2", "2024-01-02")]);
        let server = completions(&[("l2", "2024-01-02"), ("l1", "2024-01-01")]);

        let outcome = compare(&local, &server, status_of(&server));
        assert!(outcome.in_sync);
        assert!(outcome.conflicts.is_empty());
        assert!(detect_conflicts(&local, &server).is_empty());
    }

    #[test]
    fn test_missing_on_server() {
        let local = completions(&[("l1", "2024-01-01")]);
        let server = ProgressSnapshot::default();

        let outcome = compare(&local, &server, status_of(&server));
        assert!(!outcome.in_sync);
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].item_id, "l1");
        assert_eq!(outcome.conflicts[0].kind, ConflictKind::MissingOnServer);
        assert_eq!(outcome.conflicts[0].server_timestamp, None);
    }

    #[test]
    fn test_missing_on_client() {
        let local = ProgressSnapshot::default();
        let server = completions(&[("l1", "2024-01-01")]);

        let conflicts = detect_conflicts(&local, &server);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].item_id, "l1");
        assert_eq!(conflicts[0].kind, ConflictKind::MissingOnClient);
        assert_eq!(conflicts[0].server_timestamp.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn test_timestamp_mismatch() {
        let local = completions(&[("l1", "2024-01-01T00:00:00Z")]);
        let server = completions(&[("l1", "2024-01-01T12:00:00Z")]);

        let conflicts = detect_conflicts(&local, &server);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::TimestampMismatch);
        assert_eq!(
            conflicts[0].client_timestamp.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
        assert_eq!(
            conflicts[0].server_timestamp.as_deref(),
            Some("2024-01-01T12:00:00Z")
        );
    }

    #[test]
    fn test_conflicts_grouped_by_kind() {
        let local = ProgressSnapshot {
            notes: vec![SyncItem::new("n1", "1")],
            completions: vec![SyncItem::new("c1", "1")],
            ..ProgressSnapshot::default()
        };
        let server = ProgressSnapshot {
            bookmarks: vec![SyncItem::new("b1", "1")],
            quiz_attempts: vec![SyncItem::new("q1", "1")],
            ..ProgressSnapshot::default()
        };

        let kinds: Vec<ItemKind> = detect_conflicts(&local, &server)
            .iter()
            .map(|c| c.item_kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ItemKind::Completion,
                ItemKind::QuizAttempt,
                ItemKind::Bookmark,
                ItemKind::Note
            ]
        );
    }

    #[test]
    fn test_join_order_within_kind() {
        let local = completions(&[("a", "1"), ("b", "1"), ("c", "1")]);
        let server = completions(&[("z", "1"), ("b", "2"), ("y", "1")]);

        let conflicts = detect_conflicts(&local, &server);
        let ids: Vec<(&str, ConflictKind)> = conflicts
            .iter()
            .map(|c| (c.item_id.as_str(), c.kind))
            .collect();

        assert_eq!(
            ids,
            vec![
                ("a", ConflictKind::MissingOnServer),
                ("b", ConflictKind::TimestampMismatch),
                ("c", ConflictKind::MissingOnServer),
                ("z", ConflictKind::MissingOnClient),
                ("y", ConflictKind::MissingOnClient),
            ]
        );
    }

    #[test]
    fn test_duplicate_server_ids_out_of_sync() {
        let local = ProgressSnapshot {
            quiz_attempts: vec![SyncItem::new("q1", "2024-01-02")],
            ..ProgressSnapshot::default()
        };
        let server = ProgressSnapshot {
            quiz_attempts: vec![
                SyncItem::new("q1", "2024-01-01"),
                SyncItem::new("q1", "2024-01-02"),
            ],
            ..ProgressSnapshot::default()
        };

        let outcome = compare(&local, &server, status_of(&server));
        assert!(!outcome.in_sync);
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].kind, ConflictKind::MissingOnClient);
        assert_eq!(
            outcome.conflicts[0].server_timestamp.as_deref(),
            Some("2024-01-01")
        );
    }

    #[test]
    fn test_duplicate_ids_pair_exact_matches_first() {
        let local = completions(&[("l1", "2"), ("l1", "1")]);
        let server = completions(&[("l1", "1"), ("l1", "3")]);

        let conflicts = detect_conflicts(&local, &server);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::TimestampMismatch);
        assert_eq!(conflicts[0].client_timestamp.as_deref(), Some("2"));
        assert_eq!(conflicts[0].server_timestamp.as_deref(), Some("3"));
    }

    #[test]
    fn test_duplicate_local_entries_each_need_a_match() {
        let local = completions(&[("l1", "1"), ("l1", "1")]);
        let server = completions(&[("l1", "1")]);

        let conflicts = detect_conflicts(&local, &server);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::MissingOnServer);
    }

    #[test]
    fn test_fingerprint_mismatch_never_in_sync() {
        let items = completions(&[("l1", "1")]);
        let stale = ServerStatus {
            fingerprint: SyncFingerprint::of(&ProgressSnapshot::default()),
            last_modified: None,
            item_counts: items.counts(),
        };

        let outcome = compare(&items, &items, stale);
        assert!(!outcome.in_sync);
        assert!(outcome.conflicts.is_empty());
    }

    #[test]
    fn test_same_id_across_kinds_is_independent() {
        let local = ProgressSnapshot {
            completions: vec![SyncItem::new("l1", "1")],
            ..ProgressSnapshot::default()
        };
        let server = ProgressSnapshot {
            bookmarks: vec![SyncItem::new("l1", "1")],
            ..ProgressSnapshot::default()
        };

        let conflicts = detect_conflicts(&local, &server);
        assert_eq!(conflicts.len(), 2);
        assert_eq!(conflicts[0].kind, ConflictKind::MissingOnServer);
        assert_eq!(conflicts[1].kind, ConflictKind::MissingOnClient);
    }

    #[test]
    fn test_conflict_wire_format() {
        let conflict = Conflict {
            item_kind: ItemKind::QuizAttempt,
            item_id: "q1".to_string(),
            client_timestamp: None,
            server_timestamp: Some("2024-01-01".to_string()),
            kind: ConflictKind::MissingOnClient,
        };
        let json = serde_json::to_value(&conflict).unwrap();
        assert_eq!(json["itemKind"], "quizAttempt");
        assert_eq!(json["itemId"], "q1");
        assert_eq!(json["kind"], "missingOnClient");
    }
}
