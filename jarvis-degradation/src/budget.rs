//! Per-turn failure budget: bounds how much a single turn can fail or
//! skip before the orchestrator must give up.

use std::collections::HashSet;

const DEFAULT_MAX_FAILURES_PER_TURN: u32 = 3;
const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 2;

/// Failure/skip statistics for the current turn.
#[derive(Debug, Clone)]
pub struct FailureStats {
    /// Total failures recorded this turn.
    pub total_failures: u32,
    /// Consecutive failures since the last success.
    pub consecutive_failures: u32,
    /// Tools skipped this turn.
    pub skipped_tools: Vec<String>,
    /// Whether the turn should abort given these stats.
    pub should_abort: bool,
}

/// Tracks failures and skips across one turn so a single flaky tool
/// can't spin the plan indefinitely.
#[derive(Debug, Clone)]
pub struct FailureBudget {
    max_failures_per_turn: u32,
    max_consecutive_failures: u32,
    total_failures: u32,
    consecutive_failures: u32,
    skipped_tools: HashSet<String>,
}

impl Default for FailureBudget {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FAILURES_PER_TURN, DEFAULT_MAX_CONSECUTIVE_FAILURES)
    }
}

impl FailureBudget {
    /// Construct a budget with explicit limits.
    pub fn new(max_failures_per_turn: u32, max_consecutive_failures: u32) -> Self {
        Self {
            max_failures_per_turn,
            max_consecutive_failures,
            total_failures: 0,
            consecutive_failures: 0,
            skipped_tools: HashSet::new(),
        }
    }

    /// Record a tool failure.
    pub fn record_failure(&mut self, tool_name: &str) {
        self.total_failures += 1;
        self.consecutive_failures += 1;
        tracing::debug!(
            tool = tool_name,
            total = self.total_failures,
            consecutive = self.consecutive_failures,
            "failure recorded"
        );
    }

    /// Record a tool success, resetting the consecutive-failure streak.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Record a tool skipped for dependency tracking.
    pub fn record_skip(&mut self, tool_name: impl Into<String>) {
        self.skipped_tools.insert(tool_name.into());
    }

    /// Whether the turn has exceeded its failure limits and must abort.
    pub fn should_abort(&self) -> bool {
        self.total_failures >= self.max_failures_per_turn
            || self.consecutive_failures >= self.max_consecutive_failures
    }

    /// Whether any of `dependencies` was previously skipped. If so, the
    /// step depending on it must not silently proceed — the orchestrator
    /// has to abort rather than continue with missing input.
    pub fn is_dependency_skipped(&self, dependencies: &[String]) -> bool {
        dependencies.iter().any(|d| self.skipped_tools.contains(d))
    }

    /// Snapshot the current stats.
    pub fn stats(&self) -> FailureStats {
        FailureStats {
            total_failures: self.total_failures,
            consecutive_failures: self.consecutive_failures,
            skipped_tools: self.skipped_tools.iter().cloned().collect(),
            should_abort: self.should_abort(),
        }
    }

    /// Reset all counters for a new turn.
    pub fn reset(&mut self) {
        self.total_failures = 0;
        self.consecutive_failures = 0;
        self.skipped_tools.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_resets_consecutive_but_not_total() {
        let mut budget = FailureBudget::default();
        budget.record_failure("a");
        budget.record_failure("a");
        budget.record_success();
        assert_eq!(budget.total_failures, 2);
        assert_eq!(budget.consecutive_failures, 0);
    }

    #[test]
    fn aborts_at_total_failure_limit() {
        let mut budget = FailureBudget::new(3, 10);
        budget.record_failure("a");
        budget.record_success();
        budget.record_failure("b");
        budget.record_success();
        assert!(!budget.should_abort());
        budget.record_failure("c");
        assert!(budget.should_abort());
    }

    #[test]
    fn aborts_at_consecutive_failure_limit() {
        let mut budget = FailureBudget::new(10, 2);
        budget.record_failure("a");
        assert!(!budget.should_abort());
        budget.record_failure("b");
        assert!(budget.should_abort());
    }

    #[test]
    fn dependency_skip_is_detected() {
        let mut budget = FailureBudget::default();
        budget.record_skip("search_web");
        assert!(budget.is_dependency_skipped(&["search_web".to_string()]));
        assert!(!budget.is_dependency_skipped(&["other_tool".to_string()]));
    }

    #[test]
    fn reset_clears_all_counters() {
        let mut budget = FailureBudget::default();
        budget.record_failure("a");
        budget.record_skip("a");
        budget.reset();
        let stats = budget.stats();
        assert_eq!(stats.total_failures, 0);
        assert_eq!(stats.consecutive_failures, 0);
        assert!(stats.skipped_tools.is_empty());
        assert!(!stats.should_abort);
    }
}
