//! Conflict resolution strategies.
//!
//! Resolution only decides which side should win; applying the decision is
//! left to the caller's write path.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::conflict::Conflict;

/// How conflicts are decided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// The server's version always wins.
    ServerWins,
    /// The device's version always wins.
    ClientWins,
    /// The later timestamp wins; the device wins ties.
    #[default]
    LatestWins,
    /// Every conflict is left to the user.
    Manual,
}

impl ResolutionStrategy {
    /// Parse a strategy name as accepted on the command line.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "server_wins" | "server" => Some(Self::ServerWins),
            "client_wins" | "client" => Some(Self::ClientWins),
            "latest_wins" | "latest" => Some(Self::LatestWins),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ServerWins => "server_wins",
            Self::ClientWins => "client_wins",
            Self::LatestWins => "latest_wins",
            Self::Manual => "manual",
        };
        write!(f, "{s}")
    }
}

/// Which side a conflict should be settled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Take the server's version.
    UseServer,
    /// Keep the device's version.
    UseClient,
    /// Ask the user.
    Manual,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::UseServer => "use server",
            Self::UseClient => "use client",
            Self::Manual => "manual",
        };
        write!(f, "{s}")
    }
}

/// Decide between two timestamps under `strategy`.
///
/// For [`ResolutionStrategy::LatestWins`], a side without a timestamp loses to
/// a side that has one, and unparseable timestamps defer to
/// [`Resolution::Manual`].
#[must_use]
pub fn resolve(
    client_timestamp: Option<&str>,
    server_timestamp: Option<&str>,
    strategy: ResolutionStrategy,
) -> Resolution {
    match strategy {
        ResolutionStrategy::ServerWins => Resolution::UseServer,
        ResolutionStrategy::ClientWins => Resolution::UseClient,
        ResolutionStrategy::Manual => Resolution::Manual,
        ResolutionStrategy::LatestWins => match (client_timestamp, server_timestamp) {
            (Some(client), Some(server)) => {
                match (parse_timestamp(client), parse_timestamp(server)) {
                    (Some(client), Some(server)) if client >= server => Resolution::UseClient,
                    (Some(_), Some(_)) => Resolution::UseServer,
                    _ => Resolution::Manual,
                }
            },
            (Some(_), None) => Resolution::UseClient,
            (None, Some(_)) => Resolution::UseServer,
            (None, None) => Resolution::Manual,
        },
    }
}

/// Decide a detected conflict under `strategy`.
#[must_use]
pub fn resolve_conflict(conflict: &Conflict, strategy: ResolutionStrategy) -> Resolution {
    resolve(
        conflict.client_timestamp.as_deref(),
        conflict.server_timestamp.as_deref(),
        strategy,
    )
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reconcile::{ConflictKind, ItemKind};

    const EARLY: &str = "2024-01-01T00:00:00Z";
    const LATE: &str = "2024-01-01T12:00:00Z";

    #[test]
    fn test_constant_strategies() {
        let pairs = [(Some(EARLY), Some(LATE)), (Some(LATE), Some(EARLY)), (None, None)];
        for (client, server) in pairs {
            assert_eq!(
                resolve(client, server, ResolutionStrategy::ServerWins),
                Resolution::UseServer
            );
            assert_eq!(
                resolve(client, server, ResolutionStrategy::ClientWins),
                Resolution::UseClient
            );
            assert_eq!(
                resolve(client, server, ResolutionStrategy::Manual),
                Resolution::Manual
            );
        }
    }

    #[test]
    fn test_latest_wins_client_later() {
        assert_eq!(
            resolve(Some(LATE), Some(EARLY), ResolutionStrategy::LatestWins),
            Resolution::UseClient
        );
    }

    #[test]
    fn test_latest_wins_server_later() {
        assert_eq!(
            resolve(Some(EARLY), Some(LATE), ResolutionStrategy::LatestWins),
            Resolution::UseServer
        );
    }

    #[test]
    fn test_latest_wins_tie_goes_to_client() {
        assert_eq!(
            resolve(Some(EARLY), Some(EARLY), ResolutionStrategy::LatestWins),
            Resolution::UseClient
        );
        // Same instant, different offsets
        assert_eq!(
            resolve(
                Some("2024-01-01T02:00:00+02:00"),
                Some(EARLY),
                ResolutionStrategy::LatestWins
            ),
            Resolution::UseClient
        );
    }

    #[test]
    fn test_latest_wins_missing_side() {
        assert_eq!(
            resolve(Some(EARLY), None, ResolutionStrategy::LatestWins),
            Resolution::UseClient
        );
        assert_eq!(
            resolve(None, Some(EARLY), ResolutionStrategy::LatestWins),
            Resolution::UseServer
        );
    }

    #[test]
    fn test_latest_wins_unparseable_defers() {
        assert_eq!(
            resolve(Some("yesterday"), Some(EARLY), ResolutionStrategy::LatestWins),
            Resolution::Manual
        );
    }

    #[test]
    fn test_parse_date_only() {
        let parsed = parse_timestamp("2024-01-01").unwrap();
        assert_eq!(parsed, parse_timestamp(EARLY).unwrap());
        assert!(parse_timestamp("not a date").is_none());
    }

    #[test]
    fn test_resolve_conflict() {
        let conflict = Conflict {
            item_kind: ItemKind::Completion,
            item_id: "l1".to_string(),
            client_timestamp: Some(EARLY.to_string()),
            server_timestamp: Some(LATE.to_string()),
            kind: ConflictKind::TimestampMismatch,
        };
        assert_eq!(
            resolve_conflict(&conflict, ResolutionStrategy::LatestWins),
            Resolution::UseServer
        );
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!(
            ResolutionStrategy::parse("latest-wins"),
            Some(ResolutionStrategy::LatestWins)
        );
        assert_eq!(
            ResolutionStrategy::parse("SERVER"),
            Some(ResolutionStrategy::ServerWins)
        );
        assert_eq!(ResolutionStrategy::parse("coin_flip"), None);
        assert_eq!(ResolutionStrategy::ClientWins.to_string(), "client_wins");
    }
}
