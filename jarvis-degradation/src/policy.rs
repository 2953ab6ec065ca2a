//! Per-tool failure-handling policy.

use jarvis_types::PermissionLevel;

/// How a tool failure should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DegradationStrategy {
    /// Return the error immediately and abort the plan.
    FailFast,
    /// Retry with a delay, up to `max_retries` times.
    Retry,
    /// Fall back to another tool.
    Fallback,
    /// Skip this step and continue the plan.
    Skip,
    /// Continue with a partial result.
    Partial,
}

/// Failure-handling policy for a single tool.
///
/// Policies are either set explicitly via [`crate::DegradationManager::set_policy`]
/// or synthesized from a tool's permission level.
#[derive(Debug, Clone)]
pub struct DegradationPolicy {
    /// Name of the tool this policy applies to.
    pub tool_name: String,
    /// Chosen strategy.
    pub strategy: DegradationStrategy,
    /// Tool to substitute when `strategy` is `Fallback`.
    pub fallback_tool: Option<String>,
    /// Retry attempts permitted when `strategy` is `Retry`.
    pub max_retries: u32,
    /// Delay between retries.
    pub retry_delay: std::time::Duration,
    /// When true, this tool is never allowed to be skipped even under
    /// a `Skip` or `Partial` strategy.
    pub is_critical: bool,
}

impl DegradationPolicy {
    /// Construct a policy with the given tool name and strategy, and
    /// the same defaults the manager uses when synthesizing one.
    pub fn new(tool_name: impl Into<String>, strategy: DegradationStrategy) -> Self {
        Self {
            tool_name: tool_name.into(),
            strategy,
            fallback_tool: None,
            max_retries: if strategy == DegradationStrategy::Retry { 2 } else { 0 },
            retry_delay: std::time::Duration::from_secs(1),
            is_critical: false,
        }
    }

    /// Mark this policy's tool as critical: never skippable regardless
    /// of strategy.
    pub fn critical(mut self) -> Self {
        self.is_critical = true;
        self
    }

    /// Set the fallback tool (only meaningful with `Fallback`).
    pub fn with_fallback(mut self, tool_name: impl Into<String>) -> Self {
        self.fallback_tool = Some(tool_name.into());
        self
    }

    /// Whether this tool is permitted to be skipped on failure.
    pub fn allows_skip(&self) -> bool {
        !self.is_critical
            && matches!(self.strategy, DegradationStrategy::Skip | DegradationStrategy::Partial)
    }
}

/// Default strategy assigned to a tool by its permission level, absent
/// an explicit policy.
pub fn default_strategy(level: PermissionLevel) -> DegradationStrategy {
    match level {
        PermissionLevel::Read => DegradationStrategy::Retry,
        PermissionLevel::Write => DegradationStrategy::FailFast,
        PermissionLevel::Execute => DegradationStrategy::FailFast,
        PermissionLevel::Network => DegradationStrategy::Retry,
        PermissionLevel::Admin => DegradationStrategy::FailFast,
    }
}

/// Permission levels that a tool may never be skipped at, regardless
/// of its assigned strategy.
pub fn is_critical_level(level: PermissionLevel) -> bool {
    matches!(
        level,
        PermissionLevel::Write | PermissionLevel::Execute | PermissionLevel::Admin
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_defaults_to_two_retries() {
        let policy = DegradationPolicy::new("search_web", DegradationStrategy::Retry);
        assert_eq!(policy.max_retries, 2);
    }

    #[test]
    fn fail_fast_policy_has_no_retries() {
        let policy = DegradationPolicy::new("shell", DegradationStrategy::FailFast);
        assert_eq!(policy.max_retries, 0);
    }

    #[test]
    fn critical_policy_never_allows_skip_even_with_skip_strategy() {
        let policy = DegradationPolicy::new("delete_file", DegradationStrategy::Skip).critical();
        assert!(!policy.allows_skip());
    }

    #[test]
    fn non_critical_skip_or_partial_allows_skip() {
        let skip = DegradationPolicy::new("search_web", DegradationStrategy::Skip);
        let partial = DegradationPolicy::new("search_web", DegradationStrategy::Partial);
        assert!(skip.allows_skip());
        assert!(partial.allows_skip());
    }

    #[test]
    fn retry_and_fail_fast_never_allow_skip() {
        let retry = DegradationPolicy::new("search_web", DegradationStrategy::Retry);
        let fail_fast = DegradationPolicy::new("shell", DegradationStrategy::FailFast);
        assert!(!retry.allows_skip());
        assert!(!fail_fast.allows_skip());
    }

    #[test]
    fn write_execute_admin_are_critical_levels() {
        assert!(is_critical_level(PermissionLevel::Write));
        assert!(is_critical_level(PermissionLevel::Execute));
        assert!(is_critical_level(PermissionLevel::Admin));
        assert!(!is_critical_level(PermissionLevel::Read));
        assert!(!is_critical_level(PermissionLevel::Network));
    }
}
