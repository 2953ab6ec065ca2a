//! Row types for the persisted tables.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// A conversation session.
#[derive(Debug, Clone)]
pub struct Conversation {
    /// Primary key.
    pub id: String,
    /// When the conversation started.
    pub created_at: DateTime<Utc>,
    /// Free-form metadata.
    pub meta: Value,
}

impl Conversation {
    /// Start a new conversation with a generated id.
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            meta: Value::Object(Default::default()),
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// A single turn (one user or assistant message) within a conversation.
#[derive(Debug, Clone)]
pub struct Turn {
    /// Primary key.
    pub id: String,
    /// Owning conversation.
    pub conversation_id: String,
    /// Logging/audit turn id, for cross-referencing the audit trail.
    pub turn_id: String,
    /// `"user"` or `"assistant"`.
    pub role: String,
    /// Message content.
    pub content: String,
    /// When the turn occurred.
    pub timestamp: DateTime<Utc>,
    /// Free-form metadata.
    pub meta: Value,
}

/// A key-value memory entry, optionally carrying an embedding for
/// similarity search.
#[derive(Debug, Clone)]
pub struct Memory {
    /// Primary key.
    pub id: String,
    /// Unique lookup key.
    pub key: String,
    /// Stored value.
    pub value: Option<Value>,
    /// Optional embedding vector, stored as raw bytes.
    pub embedding: Option<Vec<u8>>,
    /// First written.
    pub created_at: DateTime<Utc>,
    /// Last written.
    pub updated_at: DateTime<Utc>,
}

/// Status of a persisted scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Waiting to run.
    Pending,
    /// Ran to completion (or hit its run limit).
    Completed,
    /// Cancelled before running.
    Cancelled,
}

impl TaskStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub(crate) fn parse(value: &str) -> Self {
        match value {
            "completed" => TaskStatus::Completed,
            "cancelled" => TaskStatus::Cancelled,
            _ => TaskStatus::Pending,
        }
    }
}

/// A persisted row backing a scheduled task. The scheduler owns the
/// richer in-memory `ScheduledTask`; this is its storage projection.
#[derive(Debug, Clone)]
pub struct TaskRow {
    /// Primary key.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// The action text dispatched back into the orchestrator when due.
    pub action: String,
    /// Current status.
    pub status: TaskStatus,
    /// When the task is next due, if scheduled.
    pub scheduled_time: Option<DateTime<Utc>>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_look_like_uuidv4() {
        let id = Conversation::new().id;
        assert_eq!(id.len(), 36);
        assert_eq!(id.chars().nth(14), Some('4'));
    }

    #[test]
    fn task_status_round_trips_through_its_string_form() {
        for status in [TaskStatus::Pending, TaskStatus::Completed, TaskStatus::Cancelled] {
            assert_eq!(TaskStatus::parse(status.as_str()), status);
        }
    }
}
