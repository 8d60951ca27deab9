//! Durable action queue.
//!
//! User actions are persisted locally and delivered to the server in order
//! whenever connectivity allows.

mod action;
#[allow(clippy::module_inception)]
mod queue;
mod report;
mod store;

pub use action::{
    Action, ActionKind, BookmarkPayload, LessonCompletePayload, NotePayload, QueuedAction,
    QuizSubmitPayload,
};
pub use queue::{ActionQueue, ActionSink, RetryPolicy, MAX_RETRIES};
pub use report::{
    format_drain_report, DeliveryOutcome, DeliveryResult, DrainReport, QueueEvent, QueueStatus,
};
pub use store::{ActionStore, SqliteActionStore};
