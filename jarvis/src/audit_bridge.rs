//! Adapters from the narrow per-crate `AuditSink` traits onto a shared
//! [`jarvis_audit::AuditLog`], so the executor and memory governor never
//! need to depend on the audit crate directly.

use jarvis_audit::{Actor, AuditLog, EventType};

/// Bridges [`jarvis_executor::AuditSink`] onto an [`AuditLog`], turn-scoped
/// so every `TOOL_EXECUTE` entry carries the turn it belongs to.
pub struct ExecutorAuditBridge<'a> {
    log: &'a AuditLog<'a>,
}

impl<'a> ExecutorAuditBridge<'a> {
    /// Wrap `log` for use as an executor audit sink.
    pub fn new(log: &'a AuditLog<'a>) -> Self {
        Self { log }
    }
}

impl jarvis_executor::AuditSink for ExecutorAuditBridge<'_> {
    fn record_tool_execute(&self, entry: jarvis_executor::ToolExecuteEntry) {
        let details = serde_json::json!({
            "status": format!("{:?}", entry.status),
            "duration_ms": entry.duration.as_millis() as u64,
        });
        if let Err(e) = self.log.log(
            EventType::ToolExecute,
            Actor::Executor,
            entry.action,
            entry.turn_id,
            Some(entry.tool_name),
            Some(details),
        ) {
            tracing::error!(error = %e, "failed to append TOOL_EXECUTE audit entry");
        }
    }

    fn record_authority_check(&self, entry: jarvis_executor::AuthorityCheckEntry) {
        let action = authority_status_action(&entry.status);
        let details = serde_json::json!({
            "status": format!("{:?}", entry.status),
            "required_level": format!("{:?}", entry.required_level),
        });
        if let Err(e) =
            self.log.log(EventType::AuthorityCheck, Actor::Authority, action, entry.turn_id, Some(entry.tool_name), Some(details))
        {
            tracing::error!(error = %e, "failed to append AUTHORITY_CHECK audit entry");
        }
    }

    fn record_confirm_response(&self, entry: jarvis_executor::ConfirmResponseEntry) {
        let action = match entry.outcome {
            jarvis_authority::ConfirmationOutcome::Approved => "approved",
            jarvis_authority::ConfirmationOutcome::Denied => "denied",
            jarvis_authority::ConfirmationOutcome::Timeout => "timeout",
            jarvis_authority::ConfirmationOutcome::NotFound => "not_found",
        };
        let details = serde_json::json!({ "confirmation_id": entry.confirmation_id });
        if let Err(e) =
            self.log.log(EventType::ConfirmResponse, Actor::Authority, action, entry.turn_id, Some(entry.tool_name), Some(details))
        {
            tracing::error!(error = %e, "failed to append CONFIRM_RESPONSE audit entry");
        }
    }

    fn record_grant_created(&self, entry: jarvis_executor::GrantCreatedEntry) {
        let details = serde_json::json!({
            "level": format!("{:?}", entry.level),
            "source": format!("{:?}", entry.source),
        });
        if let Err(e) = self.log.log(
            EventType::GrantCreated,
            Actor::Authority,
            "grant_created",
            entry.turn_id,
            Some(entry.tool_name),
            Some(details),
        ) {
            tracing::error!(error = %e, "failed to append GRANT_CREATED audit entry");
        }
    }

    fn record_grant_revoked(&self, entry: jarvis_executor::GrantRevokedEntry) {
        let details = serde_json::json!({ "reason": "one_time_grant_consumed" });
        if let Err(e) = self.log.log(
            EventType::GrantRevoked,
            Actor::Authority,
            "grant_revoked",
            entry.turn_id,
            Some(entry.tool_name),
            Some(details),
        ) {
            tracing::error!(error = %e, "failed to append GRANT_REVOKED audit entry");
        }
    }
}

fn authority_status_action(status: &jarvis_authority::DecisionStatus) -> &'static str {
    use jarvis_authority::DecisionStatus::*;
    match status {
        Granted => "granted",
        DeniedNoGrant => "denied_no_grant",
        DeniedExpired => "denied_expired",
        DeniedRevoked => "denied_revoked",
        DeniedLevelMismatch => "denied_level_mismatch",
        RequiresConfirmation => "requires_confirmation",
    }
}

/// Bridges [`jarvis_memory::AuditSink`] onto an [`AuditLog`].
pub struct MemoryAuditBridge<'a> {
    log: &'a AuditLog<'a>,
}

impl<'a> MemoryAuditBridge<'a> {
    /// Wrap `log` for use as a memory-governance audit sink.
    pub fn new(log: &'a AuditLog<'a>) -> Self {
        Self { log }
    }
}

impl jarvis_memory::AuditSink for MemoryAuditBridge<'_> {
    fn record(&self, entry: jarvis_memory::MemoryEventEntry) {
        let event_type = match entry.action {
            "redact" => EventType::MemoryRedact,
            _ => EventType::MemoryDelete,
        };
        let details = serde_json::json!({ "action": entry.action, "count": entry.count });
        let turn_id = entry.turn_id.unwrap_or_else(jarvis_turn::TurnContext::current_or_dash);
        if let Err(e) = self.log.log(event_type, Actor::Governor, entry.action, turn_id, entry.target, Some(details))
        {
            tracing::error!(error = %e, "failed to append memory-governance audit entry");
        }
    }
}
