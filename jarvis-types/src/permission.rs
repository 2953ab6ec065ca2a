//! Permission levels and grants.

use serde::{Deserialize, Serialize};

/// A tool's required privilege level. Ordered loosely by blast radius,
/// though the authority gate treats each level as an independent set of
/// grants rather than a total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PermissionLevel {
    /// Read-only access (no state mutation, no external effect).
    Read,
    /// Mutates local state.
    Write,
    /// Launches a process or application.
    Execute,
    /// Performs a network call.
    Network,
    /// Administrative / destructive action (e.g. forget_all).
    Admin,
}

/// Where a grant originated. Default grants never bypass confirmation
/// for levels in the confirmation-required set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantSource {
    /// Seeded from configuration at startup.
    Default,
    /// Explicitly created by the user (persisted).
    User,
    /// Created for the current session only (in-memory, never persisted).
    Session,
}

/// A permission record authorizing a tool (or permission level) to execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionGrant {
    /// Tool name or permission-level name this grant applies to.
    pub target: String,
    /// The level this grant covers.
    pub level: PermissionLevel,
    /// When the grant was created.
    pub granted_at: chrono::DateTime<chrono::Utc>,
    /// When the grant expires, if ever.
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Whether this grant is consumed after a single successful use.
    pub one_time: bool,
    /// Whether this grant has been explicitly revoked.
    pub revoked: bool,
    /// Where this grant came from.
    pub source: GrantSource,
}

impl PermissionGrant {
    /// Construct a new, unrevoked grant.
    pub fn new(
        target: impl Into<String>,
        level: PermissionLevel,
        source: GrantSource,
    ) -> Self {
        Self {
            target: target.into(),
            level,
            granted_at: chrono::Utc::now(),
            expires_at: None,
            one_time: false,
            revoked: false,
            source,
        }
    }

    /// Set an expiry relative to now.
    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.expires_at = Some(chrono::Utc::now() + ttl);
        self
    }

    /// Mark this grant as one-time use.
    pub fn one_time(mut self) -> Self {
        self.one_time = true;
        self
    }

    /// Whether this grant is usable right now: not revoked and not expired.
    pub fn is_valid(&self) -> bool {
        !self.revoked && !self.is_expired()
    }

    /// Whether this grant's expiry has passed.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| chrono::Utc::now() > exp)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_grant_is_valid() {
        let g = PermissionGrant::new("shell", PermissionLevel::Execute, GrantSource::Session);
        assert!(g.is_valid());
        assert!(!g.is_expired());
    }

    #[test]
    fn revoked_grant_is_invalid() {
        let mut g = PermissionGrant::new("shell", PermissionLevel::Execute, GrantSource::User);
        g.revoked = true;
        assert!(!g.is_valid());
    }

    #[test]
    fn expired_grant_is_invalid() {
        let g = PermissionGrant::new("shell", PermissionLevel::Network, GrantSource::Session)
            .with_ttl(chrono::Duration::seconds(-1));
        assert!(g.is_expired());
        assert!(!g.is_valid());
    }
}
