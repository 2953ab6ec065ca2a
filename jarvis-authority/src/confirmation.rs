//! Confirmation Workflow: interactive approval of high-privilege
//! tool calls once [`crate::Authority::check`] returns
//! `RequiresConfirmation`.

use std::collections::HashMap;
use std::sync::RwLock;

use jarvis_types::{GrantSource, PendingConfirmation, PermissionLevel};

use crate::Authority;

/// Default confirmation expiry.
pub const DEFAULT_EXPIRES_IN_SECONDS: u64 = 60;

/// Outcome of resolving a pending confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// The user approved; a session grant for this tool+level now exists.
    Approved,
    /// The user explicitly denied; nothing executes.
    Denied,
    /// The confirmation's `expires_in_seconds` elapsed before resolution.
    Timeout,
    /// No pending confirmation with that id exists (already resolved or
    /// never created).
    NotFound,
}

/// Tracks confirmations awaiting explicit user approval.
pub struct ConfirmationWorkflow<'a> {
    authority: &'a Authority,
    pending: RwLock<HashMap<String, PendingConfirmation>>,
}

impl<'a> ConfirmationWorkflow<'a> {
    /// Construct a workflow bound to the authority it grants into on
    /// approval.
    pub fn new(authority: &'a Authority) -> Self {
        Self {
            authority,
            pending: RwLock::new(HashMap::new()),
        }
    }

    /// Construct and register a new pending confirmation for `tool_name`,
    /// returning its record. Callers are responsible for logging the
    /// corresponding `CONFIRM_REQUEST` audit entry.
    pub fn request(
        &self,
        tool_name: impl Into<String>,
        args: serde_json::Value,
        turn_id: impl Into<String>,
    ) -> PendingConfirmation {
        let id = generate_confirmation_id();
        let record = PendingConfirmation::new(
            id.clone(),
            tool_name,
            args,
            DEFAULT_EXPIRES_IN_SECONDS,
            turn_id,
        );
        self.pending
            .write()
            .expect("confirmation table poisoned")
            .insert(id, record.clone());
        record
    }

    /// Look up a pending confirmation without resolving it.
    pub fn get(&self, id: &str) -> Option<PendingConfirmation> {
        self.pending
            .read()
            .expect("confirmation table poisoned")
            .get(id)
            .cloned()
    }

    /// Resolve a pending confirmation.
    ///
    /// An expired confirmation always resolves to `Timeout`, even if
    /// `approved` is true. Approval grants a session-scoped permission
    /// for the specific tool at `level` before returning.
    pub fn confirm_pending(
        &self,
        id: &str,
        approved: bool,
        level: PermissionLevel,
    ) -> ConfirmationOutcome {
        let record = {
            let mut table = self.pending.write().expect("confirmation table poisoned");
            table.remove(id)
        };

        let Some(record) = record else {
            return ConfirmationOutcome::NotFound;
        };

        if record.is_expired() {
            tracing::info!(id, "pending confirmation timed out");
            return ConfirmationOutcome::Timeout;
        }

        if !approved {
            tracing::info!(id, tool = %record.tool_name, "confirmation denied");
            return ConfirmationOutcome::Denied;
        }

        self.authority.grant(
            record.tool_name.clone(),
            level,
            None,
            false,
            GrantSource::Session,
        );
        tracing::info!(id, tool = %record.tool_name, "confirmation approved");
        ConfirmationOutcome::Approved
    }
}

fn generate_confirmation_id() -> String {
    let bytes: [u8; 8] = rand::random();
    format!("confirm_{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn workflow(authority: &Authority) -> ConfirmationWorkflow<'_> {
        ConfirmationWorkflow::new(authority)
    }

    #[test]
    fn approval_grants_session_permission() {
        let authority = Authority::new(HashSet::new(), HashSet::from([PermissionLevel::Execute]));
        let flow = workflow(&authority);
        let pending = flow.request(
            "open_application",
            serde_json::json!({"app_name": "Safari"}),
            "turn_1",
        );
        let outcome = flow.confirm_pending(&pending.id, true, PermissionLevel::Execute);
        assert_eq!(outcome, ConfirmationOutcome::Approved);
        let decision = authority.check("open_application", PermissionLevel::Execute);
        assert_eq!(decision.status, crate::authority::DecisionStatus::Granted);
    }

    #[test]
    fn denial_produces_no_side_effect() {
        let authority = Authority::new(HashSet::new(), HashSet::from([PermissionLevel::Execute]));
        let flow = workflow(&authority);
        let pending = flow.request("open_application", serde_json::json!({}), "turn_1");
        let outcome = flow.confirm_pending(&pending.id, false, PermissionLevel::Execute);
        assert_eq!(outcome, ConfirmationOutcome::Denied);
        let decision = authority.check("open_application", PermissionLevel::Execute);
        assert_eq!(decision.status, crate::authority::DecisionStatus::DeniedNoGrant);
    }

    #[test]
    fn zero_ttl_confirmation_is_rejected_as_timeout() {
        let authority = Authority::new(HashSet::new(), HashSet::new());
        let flow = workflow(&authority);
        let id = "manual";
        flow.pending.write().unwrap().insert(
            id.to_string(),
            PendingConfirmation::new(id, "shell", serde_json::json!({}), 0, "turn_1"),
        );
        let outcome = flow.confirm_pending(id, true, PermissionLevel::Execute);
        assert_eq!(outcome, ConfirmationOutcome::Timeout);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let authority = Authority::new(HashSet::new(), HashSet::new());
        let flow = workflow(&authority);
        let outcome = flow.confirm_pending("nonexistent", true, PermissionLevel::Execute);
        assert_eq!(outcome, ConfirmationOutcome::NotFound);
    }
}
