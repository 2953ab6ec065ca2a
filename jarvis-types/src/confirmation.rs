//! Pending interactive confirmations.

use serde::{Deserialize, Serialize};

/// A short-lived record awaiting explicit user approval before a
/// high-privilege tool call executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfirmation {
    /// Unique identifier for this confirmation request.
    pub id: String,
    /// The tool awaiting approval.
    pub tool_name: String,
    /// The arguments that would be passed if approved.
    pub args: serde_json::Value,
    /// When the confirmation was requested.
    pub requested_at: chrono::DateTime<chrono::Utc>,
    /// How many seconds after `requested_at` this confirmation expires.
    pub expires_in_seconds: u64,
    /// The turn this confirmation was raised within.
    pub turn_id: String,
}

impl PendingConfirmation {
    /// Construct a new pending confirmation requested now.
    pub fn new(
        id: impl Into<String>,
        tool_name: impl Into<String>,
        args: serde_json::Value,
        expires_in_seconds: u64,
        turn_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            args,
            requested_at: chrono::Utc::now(),
            expires_in_seconds,
            turn_id: turn_id.into(),
        }
    }

    /// Whether this confirmation has expired by wall clock.
    pub fn is_expired(&self) -> bool {
        let deadline =
            self.requested_at + chrono::Duration::seconds(self.expires_in_seconds as i64);
        chrono::Utc::now() > deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ttl_confirmation_is_already_expired() {
        let c = PendingConfirmation::new(
            "c1",
            "open_application",
            serde_json::json!({"app_name": "Safari"}),
            0,
            "turn_1",
        );
        assert!(c.is_expired());
    }

    #[test]
    fn fresh_confirmation_with_ttl_is_not_expired() {
        let c = PendingConfirmation::new(
            "c2",
            "open_application",
            serde_json::json!({}),
            60,
            "turn_1",
        );
        assert!(!c.is_expired());
    }
}
