//! Memory governance: ties policy, redaction, retention, and the
//! user-triggered deletion commands together behind one entry point.

use std::sync::Mutex;

use serde_json::{json, Value};

use crate::policy::MemoryPolicy;
use crate::redaction::{self, RedactionResult};
use crate::retention::{self, DeletionResult, Retainable};

/// A memory governance event worth auditing.
#[derive(Debug, Clone)]
pub struct MemoryEventEntry {
    /// The turn this event happened under, if any.
    pub turn_id: Option<String>,
    /// Fixed action label: `"redact"`, `"forget_all"`, `"forget_conversation"`,
    /// or `"enforce_retention"`.
    pub action: &'static str,
    /// The object acted on — a conversation id, for `forget_conversation`.
    pub target: Option<String>,
    /// Items affected (redaction count, or items deleted).
    pub count: usize,
}

/// Sink for memory governance events. Kept as a narrow trait so this
/// crate never has to depend on `jarvis-audit` directly — the caller
/// wires an `AuditLog`-backed implementation at the top level.
pub trait AuditSink: Send + Sync {
    /// Record one governance event.
    fn record(&self, entry: MemoryEventEntry);
}

/// An [`AuditSink`] that discards everything. Used by default and in tests.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _entry: MemoryEventEntry) {}
}

/// Enforces retention, redaction, and user-deletion policy over stored
/// conversation memory.
///
/// Retention limits are hard: content past them is deleted, not merely
/// hidden. Sensitive-pattern redaction is static-regex only. Every
/// redaction and deletion is both recorded in an in-process log (for
/// `get_memory_summary`) and forwarded to the configured [`AuditSink`].
pub struct MemoryGovernor<'a> {
    policy: MemoryPolicy,
    audit: &'a dyn AuditSink,
    deletion_log: Mutex<Vec<DeletionResult>>,
}

impl<'a> MemoryGovernor<'a> {
    /// Build a governor with an explicit policy and audit sink.
    pub fn new(policy: MemoryPolicy, audit: &'a dyn AuditSink) -> Self {
        Self {
            policy,
            audit,
            deletion_log: Mutex::new(Vec::new()),
        }
    }

    /// Build a governor with the default policy and no audit wiring.
    /// Mainly useful in tests.
    pub fn with_defaults(audit: &'a dyn AuditSink) -> Self {
        Self::new(MemoryPolicy::default(), audit)
    }

    /// The active policy.
    pub fn policy(&self) -> &MemoryPolicy {
        &self.policy
    }

    /// Redact sensitive content per policy. See [`redaction::redact`].
    pub fn redact(&self, content: &str, turn_id: Option<String>) -> (String, RedactionResult) {
        let (redacted, result) = redaction::redact(&self.policy, content);
        if result.was_redacted() {
            self.audit.record(MemoryEventEntry {
                turn_id,
                action: "redact",
                target: None,
                count: result.redaction_count,
            });
        }
        (redacted, result)
    }

    /// Enforce retention limits on `turns`. See [`retention::enforce_retention`].
    pub fn enforce_retention<T: Retainable>(
        &self,
        turns: Vec<T>,
        turn_id: Option<String>,
    ) -> (Vec<T>, DeletionResult) {
        let (retained, result) = retention::enforce_retention(&self.policy, turns, turn_id);
        if result.items_deleted > 0 {
            self.deletion_log.lock().expect("deletion log lock poisoned").push(result.clone());
            self.audit.record(MemoryEventEntry {
                turn_id: result.turn_id.clone(),
                action: "enforce_retention",
                target: None,
                count: result.items_deleted,
            });
        }
        (retained, result)
    }

    /// Delete everything (user-triggered). `items_deleted` is left at 0
    /// here — the caller (which owns the actual storage) reports the real
    /// count back via the storage layer; this just produces the audited
    /// deletion-log entry recording that the command was issued.
    pub fn forget_all(&self, turn_id: Option<String>) -> DeletionResult {
        tracing::warn!(turn_id = turn_id.as_deref().unwrap_or("N/A"), "forget-all requested");
        let result = DeletionResult {
            items_deleted: 0,
            reason: "User requested: forget everything".to_string(),
            turn_id,
        };
        self.deletion_log.lock().expect("deletion log lock poisoned").push(result.clone());
        self.audit.record(MemoryEventEntry {
            turn_id: result.turn_id.clone(),
            action: "forget_all",
            target: None,
            count: 0,
        });
        result
    }

    /// Delete a specific conversation (user-triggered).
    pub fn forget_conversation(
        &self,
        conversation_id: impl Into<String>,
        turn_id: Option<String>,
    ) -> DeletionResult {
        let conversation_id = conversation_id.into();
        tracing::info!(
            conversation_id,
            turn_id = turn_id.as_deref().unwrap_or("N/A"),
            "forget-conversation requested"
        );
        let result = DeletionResult {
            items_deleted: 0,
            reason: format!("User requested: forget conversation {conversation_id}"),
            turn_id,
        };
        self.deletion_log.lock().expect("deletion log lock poisoned").push(result.clone());
        self.audit.record(MemoryEventEntry {
            turn_id: result.turn_id.clone(),
            action: "forget_conversation",
            target: Some(conversation_id),
            count: 0,
        });
        result
    }

    /// All deletion-log entries recorded so far, oldest first.
    pub fn get_deletion_log(&self) -> Vec<DeletionResult> {
        self.deletion_log.lock().expect("deletion log lock poisoned").clone()
    }

    /// A JSON summary of the active policy and governance activity, for a
    /// "what do you remember?" style command.
    pub fn get_memory_summary(&self) -> Value {
        json!({
            "policy": {
                "max_turns": self.policy.max_turns,
                "max_age_days": self.policy.max_age_days,
                "redaction_enabled": self.policy.redact_on_store,
                "sensitive_patterns_count": self.policy.sensitive_patterns.len(),
            },
            "deletions_performed": self.deletion_log.lock().expect("deletion log lock poisoned").len(),
        })
    }
}
