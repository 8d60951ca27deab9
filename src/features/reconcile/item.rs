//! Progress items compared between a device and the server.

use serde::{Deserialize, Serialize};

/// The four kinds of progress item, in their stable reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemKind {
    /// A completed lesson.
    Completion,
    /// A submitted quiz.
    QuizAttempt,
    /// A bookmarked lesson.
    Bookmark,
    /// A note attached to a lesson.
    Note,
}

impl ItemKind {
    /// All kinds in reporting order.
    pub const ALL: [Self; 4] = [Self::Completion, Self::QuizAttempt, Self::Bookmark, Self::Note];

    /// Storage key for this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completion => "completion",
            Self::QuizAttempt => "quiz_attempt",
            Self::Bookmark => "bookmark",
            Self::Note => "note",
        }
    }

    /// Parse a storage key.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completion" => Some(Self::Completion),
            "quiz_attempt" => Some(Self::QuizAttempt),
            "bookmark" => Some(Self::Bookmark),
            "note" => Some(Self::Note),
            _ => None,
        }
    }

    /// Human readable label.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Completion => "Completion",
            Self::QuizAttempt => "Quiz attempt",
            Self::Bookmark => "Bookmark",
            Self::Note => "Note",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// One progress item reduced to what reconciliation compares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncItem {
    /// Item identifier, unique within its kind.
    pub id: String,
    /// The item's relevant timestamp as the server renders it.
    pub timestamp: String,
}

impl SyncItem {
    /// Create an item.
    #[must_use]
    pub fn new(id: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            timestamp: timestamp.into(),
        }
    }
}

/// A party's full progress inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressSnapshot {
    /// Completed lessons.
    pub completions: Vec<SyncItem>,
    /// Quiz attempts.
    pub quiz_attempts: Vec<SyncItem>,
    /// Bookmarks.
    pub bookmarks: Vec<SyncItem>,
    /// Notes.
    pub notes: Vec<SyncItem>,
}

impl ProgressSnapshot {
    /// Items of one kind.
    #[must_use]
    pub fn items(&self, kind: ItemKind) -> &[SyncItem] {
        match kind {
            ItemKind::Completion => &self.completions,
            ItemKind::QuizAttempt => &self.quiz_attempts,
            ItemKind::Bookmark => &self.bookmarks,
            ItemKind::Note => &self.notes,
        }
    }

    /// Mutable items of one kind.
    pub fn items_mut(&mut self, kind: ItemKind) -> &mut Vec<SyncItem> {
        match kind {
            ItemKind::Completion => &mut self.completions,
            ItemKind::QuizAttempt => &mut self.quiz_attempts,
            ItemKind::Bookmark => &mut self.bookmarks,
            ItemKind::Note => &mut self.notes,
        }
    }

    /// Count items per kind.
    #[must_use]
    pub fn counts(&self) -> ItemCounts {
        ItemCounts {
            completions: self.completions.len(),
            quiz_attempts: self.quiz_attempts.len(),
            bookmarks: self.bookmarks.len(),
            notes: self.notes.len(),
        }
    }
}

/// Number of items per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemCounts {
    pub completions: usize,
    pub quiz_attempts: usize,
    pub bookmarks: usize,
    pub notes: usize,
}

impl ItemCounts {
    /// Total items across kinds.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.completions + self.quiz_attempts + self.bookmarks + self.notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_kind_round_trip_storage_key() {
        for kind in ItemKind::ALL {
            assert_eq!(ItemKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ItemKind::parse("lesson"), None);
    }

    #[test]
    fn test_snapshot_wire_format() {
        let json = r#"{
            "completions": [{"id": "l1", "timestamp": "2024-01-01T00:00:00Z"}],
            "quizAttempts": [],
            "notes": [{"id": "l2", "timestamp": "2024-01-02T00:00:00Z"}]
        }"#;

        let snapshot: ProgressSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.completions.len(), 1);
        assert!(snapshot.bookmarks.is_empty());
        assert_eq!(snapshot.items(ItemKind::Note)[0].id, "l2");

        let counts = snapshot.counts();
        assert_eq!(counts.completions, 1);
        assert_eq!(counts.notes, 1);
        assert_eq!(counts.total(), 2);
    }
}
