//! Resolves and stores degradation policies across tools.

use std::collections::HashMap;
use std::sync::RwLock;

use jarvis_types::PermissionLevel;

use crate::budget::FailureBudget;
use crate::policy::{default_strategy, is_critical_level, DegradationPolicy};

/// Why a `should_skip` call returned the answer it did. Carried as a
/// plain message since it's informational, not branched on by callers.
pub type SkipReason = String;

/// Resolves and stores per-tool degradation policies, and decides
/// whether a failed tool may be skipped.
pub struct DegradationManager {
    policies: RwLock<HashMap<String, DegradationPolicy>>,
}

impl Default for DegradationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DegradationManager {
    /// Construct a manager with no explicit policies.
    pub fn new() -> Self {
        Self {
            policies: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the policy for `tool_name`: an explicit override if one
    /// was set, otherwise one synthesized from `permission_level`.
    pub fn get_policy(&self, tool_name: &str, permission_level: PermissionLevel) -> DegradationPolicy {
        if let Some(policy) = self.policies.read().expect("policy table poisoned").get(tool_name) {
            return policy.clone();
        }

        let strategy = default_strategy(permission_level);
        let mut policy = DegradationPolicy::new(tool_name, strategy);
        policy.is_critical = is_critical_level(permission_level);
        policy
    }

    /// Install an explicit policy, overriding the default for its tool.
    pub fn set_policy(&self, policy: DegradationPolicy) {
        tracing::info!(tool = %policy.tool_name, strategy = ?policy.strategy, "degradation policy set");
        self.policies
            .write()
            .expect("policy table poisoned")
            .insert(policy.tool_name.clone(), policy);
    }

    /// Decide whether a failed `tool_name` may be skipped, given the
    /// turn's current failure budget and the tools it depends on.
    ///
    /// A dependency that was itself skipped forces the caller to abort
    /// rather than continue with missing input, even if `tool_name`'s
    /// own policy would otherwise allow skipping it.
    pub fn should_skip(
        &self,
        tool_name: &str,
        permission_level: PermissionLevel,
        failure_budget: &FailureBudget,
        dependencies: &[String],
    ) -> (bool, SkipReason) {
        let policy = self.get_policy(tool_name, permission_level);

        if !policy.allows_skip() {
            return (false, format!("tool {tool_name} is critical and cannot be skipped"));
        }

        if !dependencies.is_empty() && failure_budget.is_dependency_skipped(dependencies) {
            return (false, "a dependency was skipped; must abort for correctness".to_string());
        }

        if failure_budget.should_abort() {
            return (false, "failure budget exceeded; must abort turn".to_string());
        }

        (true, format!("tool {tool_name} skipped per {:?} strategy", policy.strategy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_for_read_is_retry_and_skippable_when_marked_so() {
        let manager = DegradationManager::new();
        let policy = manager.get_policy("get_current_time", PermissionLevel::Read);
        assert_eq!(policy.strategy, crate::policy::DegradationStrategy::Retry);
        assert!(!policy.is_critical);
    }

    #[test]
    fn default_policy_for_write_is_fail_fast_and_critical() {
        let manager = DegradationManager::new();
        let policy = manager.get_policy("write_file", PermissionLevel::Write);
        assert_eq!(policy.strategy, crate::policy::DegradationStrategy::FailFast);
        assert!(policy.is_critical);
    }

    #[test]
    fn explicit_policy_overrides_default() {
        let manager = DegradationManager::new();
        manager.set_policy(
            DegradationPolicy::new("search_web", crate::policy::DegradationStrategy::Skip),
        );
        let policy = manager.get_policy("search_web", PermissionLevel::Network);
        assert_eq!(policy.strategy, crate::policy::DegradationStrategy::Skip);
    }

    #[test]
    fn critical_tool_cannot_be_skipped_even_under_budget() {
        let manager = DegradationManager::new();
        let budget = FailureBudget::default();
        let (skip, reason) = manager.should_skip("write_file", PermissionLevel::Write, &budget, &[]);
        assert!(!skip);
        assert!(reason.contains("critical"));
    }

    #[test]
    fn skipped_dependency_forces_abort_over_skip() {
        let manager = DegradationManager::new();
        manager.set_policy(DegradationPolicy::new(
            "summarize",
            crate::policy::DegradationStrategy::Skip,
        ));
        let mut budget = FailureBudget::default();
        budget.record_skip("search_web");
        let (skip, reason) = manager.should_skip(
            "summarize",
            PermissionLevel::Read,
            &budget,
            &["search_web".to_string()],
        );
        assert!(!skip);
        assert!(reason.contains("dependency"));
    }

    #[test]
    fn exhausted_budget_blocks_skip_despite_allowing_policy() {
        let manager = DegradationManager::new();
        manager.set_policy(DegradationPolicy::new(
            "search_web",
            crate::policy::DegradationStrategy::Skip,
        ));
        let mut budget = FailureBudget::new(1, 10);
        budget.record_failure("search_web");
        let (skip, reason) = manager.should_skip("search_web", PermissionLevel::Network, &budget, &[]);
        assert!(!skip);
        assert!(reason.contains("budget"));
    }

    #[test]
    fn skippable_tool_under_budget_is_skipped() {
        let manager = DegradationManager::new();
        manager.set_policy(DegradationPolicy::new(
            "search_web",
            crate::policy::DegradationStrategy::Skip,
        ));
        let budget = FailureBudget::default();
        let (skip, _) = manager.should_skip("search_web", PermissionLevel::Network, &budget, &[]);
        assert!(skip);
    }
}
