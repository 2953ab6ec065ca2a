//! Retention-limit enforcement.

use chrono::{DateTime, Utc};

use crate::policy::MemoryPolicy;

/// Anything retention enforcement can act on: a turn, a stored message,
/// whatever the caller's history type is. Only a timestamp is required.
pub trait Retainable {
    /// When this item was created.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Outcome of an [`enforce_retention`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionResult {
    /// Number of items removed.
    pub items_deleted: usize,
    /// Human-readable reason, suitable for an audit entry.
    pub reason: String,
    /// Turn the deletion was requested under, if any.
    pub turn_id: Option<String>,
}

/// Drop items older than `policy.max_age_days`, then cap the remainder to
/// `policy.max_turns`, keeping the most recent ones.
///
/// Age is checked before the count cap, matching the policy's own
/// ordering: an old-but-within-count item is still removed.
pub fn enforce_retention<T: Retainable>(
    policy: &MemoryPolicy,
    turns: Vec<T>,
    turn_id: Option<String>,
) -> (Vec<T>, DeletionResult) {
    if turns.is_empty() {
        return (
            Vec::new(),
            DeletionResult {
                items_deleted: 0,
                reason: "No turns to process".to_string(),
                turn_id,
            },
        );
    }

    let cutoff = Utc::now() - chrono::Duration::days(policy.max_age_days);
    let mut deleted = 0usize;
    let mut retained: Vec<T> = Vec::with_capacity(turns.len());

    for turn in turns {
        if turn.timestamp() < cutoff {
            deleted += 1;
            continue;
        }
        retained.push(turn);
    }

    if retained.len() > policy.max_turns {
        let excess = retained.len() - policy.max_turns;
        retained.drain(0..excess);
        deleted += excess;
    }

    let result = DeletionResult {
        items_deleted: deleted,
        reason: format!(
            "Retention policy: max_age={}d, max_turns={}",
            policy.max_age_days, policy.max_turns
        ),
        turn_id,
    };

    if deleted > 0 {
        tracing::info!(
            deleted,
            turn_id = result.turn_id.as_deref().unwrap_or("N/A"),
            "retention enforcement removed turns"
        );
    }

    (retained, result)
}
