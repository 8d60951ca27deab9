//! Action types for the offline queue.
//!
//! Each kind of user action carries its own typed payload and maps to exactly
//! one server route.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LearnsyncError;
use crate::features::reconcile::ItemKind;

/// Action kinds that can be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Mark a lesson completed
    LessonComplete,
    /// Submit quiz answers
    QuizSubmit,
    /// Toggle a lesson bookmark
    BookmarkToggle,
    /// Save a lesson note
    NoteSave,
}

impl ActionKind {
    /// Get the display name for this kind.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::LessonComplete => "Lesson Complete",
            Self::QuizSubmit => "Quiz Submit",
            Self::BookmarkToggle => "Bookmark Toggle",
            Self::NoteSave => "Note Save",
        }
    }

    /// Storage key for this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LessonComplete => "lesson_complete",
            Self::QuizSubmit => "quiz_submit",
            Self::BookmarkToggle => "bookmark_toggle",
            Self::NoteSave => "note_save",
        }
    }

    /// Server route that accepts this kind.
    #[must_use]
    pub const fn route(&self) -> &'static str {
        match self {
            Self::LessonComplete => "/api/progress/complete",
            Self::QuizSubmit => "/api/quizzes/submit",
            Self::BookmarkToggle => "/api/bookmarks/toggle",
            Self::NoteSave => "/api/notes",
        }
    }

    /// The progress item kind this action updates.
    #[must_use]
    pub const fn item_kind(&self) -> ItemKind {
        match self {
            Self::LessonComplete => ItemKind::Completion,
            Self::QuizSubmit => ItemKind::QuizAttempt,
            Self::BookmarkToggle => ItemKind::Bookmark,
            Self::NoteSave => ItemKind::Note,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Payload for a lesson completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonCompletePayload {
    pub lesson_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent_secs: Option<u32>,
}

/// Payload for a quiz submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmitPayload {
    pub quiz_id: String,
    /// Answers keyed by question id.
    #[serde(default)]
    pub answers: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Payload for a bookmark toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkPayload {
    pub lesson_id: String,
}

/// Payload for a note save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePayload {
    pub lesson_id: String,
    pub content: String,
}

/// A user action with its typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Action {
    LessonComplete(LessonCompletePayload),
    QuizSubmit(QuizSubmitPayload),
    BookmarkToggle(BookmarkPayload),
    NoteSave(NotePayload),
}

impl Action {
    /// Create a lesson completion.
    #[must_use]
    pub fn lesson_complete(lesson_id: impl Into<String>, time_spent_secs: Option<u32>) -> Self {
        Self::LessonComplete(LessonCompletePayload {
            lesson_id: lesson_id.into(),
            time_spent_secs,
        })
    }

    /// Create a quiz submission.
    ///
    /// # Errors
    ///
    /// Returns `Config` if `score` is NaN or infinite; JSON cannot carry it.
    pub fn quiz_submit(
        quiz_id: impl Into<String>,
        answers: BTreeMap<String, serde_json::Value>,
        score: Option<f64>,
    ) -> Result<Self, LearnsyncError> {
        if let Some(score) = score.filter(|s| !s.is_finite()) {
            return Err(LearnsyncError::Config(format!(
                "quiz score must be a finite number, got {score}"
            )));
        }

        Ok(Self::QuizSubmit(QuizSubmitPayload {
            quiz_id: quiz_id.into(),
            answers,
            score,
        }))
    }

    /// Create a bookmark toggle.
    #[must_use]
    pub fn bookmark_toggle(lesson_id: impl Into<String>) -> Self {
        Self::BookmarkToggle(BookmarkPayload {
            lesson_id: lesson_id.into(),
        })
    }

    /// Create a note save.
    #[must_use]
    pub fn note_save(lesson_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::NoteSave(NotePayload {
            lesson_id: lesson_id.into(),
            content: content.into(),
        })
    }

    /// The kind of this action.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::LessonComplete(_) => ActionKind::LessonComplete,
            Self::QuizSubmit(_) => ActionKind::QuizSubmit,
            Self::BookmarkToggle(_) => ActionKind::BookmarkToggle,
            Self::NoteSave(_) => ActionKind::NoteSave,
        }
    }

    /// Id of the progress item this action touches.
    #[must_use]
    pub fn target_id(&self) -> &str {
        match self {
            Self::LessonComplete(p) => &p.lesson_id,
            Self::QuizSubmit(p) => &p.quiz_id,
            Self::BookmarkToggle(p) => &p.lesson_id,
            Self::NoteSave(p) => &p.lesson_id,
        }
    }

    /// The payload alone, as sent to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn payload_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::LessonComplete(p) => serde_json::to_value(p),
            Self::QuizSubmit(p) => serde_json::to_value(p),
            Self::BookmarkToggle(p) => serde_json::to_value(p),
            Self::NoteSave(p) => serde_json::to_value(p),
        }
    }
}

/// An action waiting for server acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedAction {
    /// Unique id, fixed at enqueue time.
    pub id: String,
    /// The action and its payload.
    pub action: Action,
    /// User who created the action.
    pub owner: String,
    /// When the action was queued; never decreases within a queue.
    pub enqueued_at: DateTime<Utc>,
    /// Failed delivery attempts so far; only increases.
    pub retry_count: u32,
}

impl QueuedAction {
    /// Create a pending action with a fresh id.
    #[must_use]
    pub fn new(action: Action, owner: impl Into<String>, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action,
            owner: owner.into(),
            enqueued_at,
            retry_count: 0,
        }
    }

    /// The kind of the wrapped action.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    /// Request body for the kind's route: the payload plus queue metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn submission_body(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut body = self.action.payload_value()?;
        if let Some(map) = body.as_object_mut() {
            map.insert("queueId".to_string(), self.id.clone().into());
            map.insert(
                "queuedAt".to_string(),
                self.enqueued_at.to_rfc3339().into(),
            );
        }
        Ok(body)
    }
}
