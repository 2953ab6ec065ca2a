//! Authority: the central gate for every tool execution.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use jarvis_types::{GrantSource, PermissionGrant, PermissionLevel};
use thiserror::Error;

/// Errors raised by authority operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// No grant exists for the given target.
    #[error("no grant for {0}")]
    NoGrant(String),
}

/// The typed outcome of an authority check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionStatus {
    /// A valid, non-confirmation-requiring grant authorizes this call.
    Granted,
    /// No grant exists for this target at all.
    DeniedNoGrant,
    /// A grant exists but its expiry has passed.
    DeniedExpired,
    /// A grant exists but has been explicitly revoked.
    DeniedRevoked,
    /// A grant exists but at a different permission level than required.
    DeniedLevelMismatch,
    /// A grant is otherwise valid but its level is in the
    /// confirmation-required set, or it is a default grant authorizing a
    /// level that always requires confirmation.
    RequiresConfirmation,
}

/// The full result of an [`Authority::check`] call.
#[derive(Debug, Clone)]
pub struct Decision {
    /// The gated outcome.
    pub status: DecisionStatus,
    /// The target (tool name) the decision concerns.
    pub target: String,
    /// The permission level that was required.
    pub required_level: PermissionLevel,
    /// Set when this `Granted` decision consumed (and so revoked) a
    /// one-time grant as a side effect.
    pub consumed_one_time: bool,
}

/// Central gate for every tool execution.
///
/// Holds default grants (seeded from configuration at startup), session
/// grants (in-memory, cleared with the session), the set of levels that
/// are always blocked, and the set of levels that always require
/// interactive confirmation regardless of grant source.
pub struct Authority {
    default_grants: RwLock<HashMap<String, PermissionGrant>>,
    session_grants: RwLock<HashMap<String, PermissionGrant>>,
    blocked_levels: HashSet<PermissionLevel>,
    confirmation_required_levels: HashSet<PermissionLevel>,
}

impl Authority {
    /// Construct an authority with no grants, seeded with the given
    /// blocked and confirmation-required level sets.
    pub fn new(
        blocked_levels: HashSet<PermissionLevel>,
        confirmation_required_levels: HashSet<PermissionLevel>,
    ) -> Self {
        Self {
            default_grants: RwLock::new(HashMap::new()),
            session_grants: RwLock::new(HashMap::new()),
            blocked_levels,
            confirmation_required_levels,
        }
    }

    /// Create or replace a grant for `target`.
    pub fn grant(
        &self,
        target: impl Into<String>,
        level: PermissionLevel,
        ttl: Option<chrono::Duration>,
        one_time: bool,
        source: GrantSource,
    ) -> PermissionGrant {
        let target = target.into();
        let mut record = PermissionGrant::new(target.clone(), level, source);
        if let Some(ttl) = ttl {
            record = record.with_ttl(ttl);
        }
        if one_time {
            record = record.one_time();
        }

        let table = match source {
            GrantSource::Session => &self.session_grants,
            GrantSource::Default | GrantSource::User => &self.default_grants,
        };
        table
            .write()
            .expect("authority grant table poisoned")
            .insert(target, record.clone());

        tracing::info!(target = %record.target, level = ?record.level, source = ?record.source, "grant created");
        record
    }

    /// Revoke any grant (session or default) for `target`.
    /// Immediate and visible to any in-flight lookup — there is no cache.
    pub fn revoke(&self, target: &str) {
        let mut revoked_any = false;
        if let Some(grant) = self
            .session_grants
            .write()
            .expect("authority grant table poisoned")
            .get_mut(target)
        {
            grant.revoked = true;
            revoked_any = true;
        }
        if let Some(grant) = self
            .default_grants
            .write()
            .expect("authority grant table poisoned")
            .get_mut(target)
        {
            grant.revoked = true;
            revoked_any = true;
        }
        if revoked_any {
            tracing::info!(target, "grant revoked");
        }
    }

    /// Drop every session-scoped grant.
    pub fn clear_session_grants(&self) {
        self.session_grants
            .write()
            .expect("authority grant table poisoned")
            .clear();
    }

    /// List every known grant, optionally including revoked ones.
    pub fn list_grants(&self, include_revoked: bool) -> Vec<PermissionGrant> {
        let session = self.session_grants.read().expect("authority grant table poisoned");
        let default = self.default_grants.read().expect("authority grant table poisoned");
        session
            .values()
            .chain(default.values())
            .filter(|g| include_revoked || !g.revoked)
            .cloned()
            .collect()
    }

    /// Check authority for `tool_name` at `required_level`.
    ///
    /// Lookup order: session grants, then default/persistent grants. A
    /// revoked grant yields `DeniedRevoked` (not `DeniedNoGrant`) so the
    /// caller learns why. A valid grant whose level is in the
    /// confirmation-required set yields `RequiresConfirmation` even when
    /// its source is `Default` — default grants never bypass confirmation
    /// for levels that require it.
    pub fn check(&self, tool_name: &str, required_level: PermissionLevel) -> Decision {
        if self.blocked_levels.contains(&required_level) {
            return Decision {
                status: DecisionStatus::DeniedNoGrant,
                target: tool_name.to_string(),
                required_level,
                consumed_one_time: false,
            };
        }

        let session = self.session_grants.read().expect("authority grant table poisoned");
        let default = self.default_grants.read().expect("authority grant table poisoned");

        let found = session.get(tool_name).or_else(|| default.get(tool_name));

        let Some(grant) = found else {
            return Decision {
                status: DecisionStatus::DeniedNoGrant,
                target: tool_name.to_string(),
                required_level,
                consumed_one_time: false,
            };
        };

        let status = if grant.revoked {
            DecisionStatus::DeniedRevoked
        } else if grant.is_expired() {
            DecisionStatus::DeniedExpired
        } else if grant.level != required_level {
            DecisionStatus::DeniedLevelMismatch
        } else if self.confirmation_required_levels.contains(&required_level) {
            DecisionStatus::RequiresConfirmation
        } else {
            DecisionStatus::Granted
        };

        let consumed_one_time = status == DecisionStatus::Granted && grant.one_time;
        drop(session);
        drop(default);

        if consumed_one_time {
            self.revoke(tool_name);
        }

        Decision {
            status,
            target: tool_name.to_string(),
            required_level,
            consumed_one_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority() -> Authority {
        Authority::new(HashSet::new(), HashSet::from([PermissionLevel::Execute]))
    }

    #[test]
    fn no_grant_yields_denied_no_grant() {
        let auth = authority();
        let decision = auth.check("shell", PermissionLevel::Read);
        assert_eq!(decision.status, DecisionStatus::DeniedNoGrant);
    }

    #[test]
    fn valid_grant_yields_granted() {
        let auth = authority();
        auth.grant("get_current_time", PermissionLevel::Read, None, false, GrantSource::Default);
        let decision = auth.check("get_current_time", PermissionLevel::Read);
        assert_eq!(decision.status, DecisionStatus::Granted);
    }

    #[test]
    fn revoked_grant_yields_denied_revoked_not_no_grant() {
        let auth = authority();
        auth.grant("shell", PermissionLevel::Write, None, false, GrantSource::Session);
        auth.revoke("shell");
        let decision = auth.check("shell", PermissionLevel::Write);
        assert_eq!(decision.status, DecisionStatus::DeniedRevoked);
    }

    #[test]
    fn expired_grant_yields_denied_expired() {
        let auth = authority();
        auth.grant(
            "shell",
            PermissionLevel::Write,
            Some(chrono::Duration::seconds(-1)),
            false,
            GrantSource::Session,
        );
        let decision = auth.check("shell", PermissionLevel::Write);
        assert_eq!(decision.status, DecisionStatus::DeniedExpired);
    }

    #[test]
    fn default_grant_at_confirmation_level_still_requires_confirmation() {
        let auth = authority();
        auth.grant(
            "open_application",
            PermissionLevel::Execute,
            None,
            false,
            GrantSource::Default,
        );
        let decision = auth.check("open_application", PermissionLevel::Execute);
        assert_eq!(decision.status, DecisionStatus::RequiresConfirmation);
    }

    #[test]
    fn one_time_grant_is_revoked_after_successful_use() {
        let auth = authority();
        auth.grant(
            "open_application",
            PermissionLevel::Read,
            None,
            true,
            GrantSource::Session,
        );
        let first = auth.check("open_application", PermissionLevel::Read);
        assert_eq!(first.status, DecisionStatus::Granted);
        let second = auth.check("open_application", PermissionLevel::Read);
        assert_eq!(second.status, DecisionStatus::DeniedRevoked);
    }

    #[test]
    fn blocked_level_is_always_denied() {
        let auth = Authority::new(HashSet::from([PermissionLevel::Admin]), HashSet::new());
        auth.grant("forget_all", PermissionLevel::Admin, None, false, GrantSource::User);
        let decision = auth.check("forget_all", PermissionLevel::Admin);
        assert_eq!(decision.status, DecisionStatus::DeniedNoGrant);
    }

    #[test]
    fn session_grant_takes_priority_over_default() {
        let auth = authority();
        auth.grant("shell", PermissionLevel::Write, None, false, GrantSource::Default);
        auth.grant("shell", PermissionLevel::Write, None, false, GrantSource::Session);
        auth.revoke("shell");
        // revoke() hits both tables, so re-grant just the session entry
        // to prove session entries are consulted first.
        auth.grant("shell", PermissionLevel::Write, None, false, GrantSource::Session);
        let decision = auth.check("shell", PermissionLevel::Write);
        assert_eq!(decision.status, DecisionStatus::Granted);
    }
}
