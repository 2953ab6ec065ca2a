//! Audit entry data model.

use serde::{Deserialize, Serialize};

/// Genesis `prev_hash` for the first entry in a chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Kind of event an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// A turn began.
    TurnStart,
    /// A turn ended.
    TurnEnd,
    /// The planner gate produced a plan.
    PlanCreated,
    /// An authority decision was made.
    AuthorityCheck,
    /// A confirmation was requested.
    ConfirmRequest,
    /// A confirmation was resolved.
    ConfirmResponse,
    /// A tool ran through the executor.
    ToolExecute,
    /// A memory deletion occurred.
    MemoryDelete,
    /// A memory redaction occurred.
    MemoryRedact,
    /// A permission grant was created.
    GrantCreated,
    /// A permission grant was revoked.
    GrantRevoked,
}

/// Who or what performed the action being audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    /// The end user.
    User,
    /// The planner/LLM backend.
    Planner,
    /// The authority subsystem.
    Authority,
    /// The executor.
    Executor,
    /// The memory governor.
    Governor,
    /// The system itself (startup, scheduler, shutdown).
    System,
}

/// One append-only audit record, chained to the previous one by HMAC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Storage-assigned id; `None` until persisted.
    pub id: Option<i64>,
    /// Turn this entry belongs to.
    pub turn_id: String,
    /// When the event occurred.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// What kind of event this is.
    pub event_type: EventType,
    /// Who performed it.
    pub actor: Actor,
    /// Free-text description of the action.
    pub action: String,
    /// The object the action concerned, if any (a tool name, a memory key).
    pub target: Option<String>,
    /// Structured context.
    pub details: Option<serde_json::Value>,
    /// Hash of the entry immediately before this one in the chain.
    pub prev_hash: String,
    /// This entry's own HMAC, computed over its canonical payload.
    pub entry_hash: String,
}

impl AuditEntry {
    /// Construct an entry with no hash fields set; [`crate::AuditLog::log`]
    /// fills `prev_hash`/`entry_hash`/`id` in before persisting.
    pub fn new(
        turn_id: impl Into<String>,
        event_type: EventType,
        actor: Actor,
        action: impl Into<String>,
        target: Option<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: None,
            turn_id: turn_id.into(),
            timestamp: chrono::Utc::now(),
            event_type,
            actor,
            action: action.into(),
            target,
            details,
            prev_hash: String::new(),
            entry_hash: String::new(),
        }
    }
}
