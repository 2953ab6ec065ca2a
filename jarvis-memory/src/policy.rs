//! Memory retention and redaction policy.

use regex::Regex;

/// Credit-card-like digit groups: four blocks of four digits, optionally
/// separated by a dash or space.
const PATTERN_CREDIT_CARD: &str = r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b";
/// SSN-like digit groups: 3-2-4.
const PATTERN_SSN: &str = r"\b\d{3}[-\s]?\d{2}[-\s]?\d{4}\b";
/// Email addresses. Included by default but easy to drop via a custom policy.
const PATTERN_EMAIL: &str = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b";

fn default_pattern_sources() -> Vec<&'static str> {
    vec![PATTERN_CREDIT_CARD, PATTERN_SSN, PATTERN_EMAIL]
}

/// Policy governing how long memory is kept and what gets redacted before
/// it is stored.
///
/// All limits here are hard: content that exceeds them is deleted, not
/// merely hidden from the user. Sensitive-data patterns are static
/// regular expressions only, so redaction behavior stays auditable —
/// there is no learned or heuristic classifier in this path.
#[derive(Debug, Clone)]
pub struct MemoryPolicy {
    /// Maximum number of turns retained per conversation.
    pub max_turns: usize,
    /// Maximum age, in days, a turn may be retained.
    pub max_age_days: i64,
    /// Maximum tokens (approximated by whitespace-split word count) stored
    /// per turn before truncation.
    pub max_tokens_per_turn: usize,
    /// Source regex strings for sensitive-data redaction.
    pub sensitive_patterns: Vec<String>,
    /// Whether redaction runs before content is stored at all.
    pub redact_on_store: bool,
    /// Placeholder text substituted for each redacted match.
    pub redaction_placeholder: String,
}

impl Default for MemoryPolicy {
    fn default() -> Self {
        Self {
            max_turns: 1000,
            max_age_days: 30,
            max_tokens_per_turn: 2000,
            sensitive_patterns: default_pattern_sources()
                .into_iter()
                .map(str::to_string)
                .collect(),
            redact_on_store: true,
            redaction_placeholder: "[REDACTED]".to_string(),
        }
    }
}

impl MemoryPolicy {
    /// Compile `sensitive_patterns` into regexes, paired with their
    /// source string, skipping (and logging) any pattern that fails to
    /// compile rather than aborting the whole policy.
    pub fn compiled_patterns(&self) -> Vec<(&str, Regex)> {
        self.sensitive_patterns
            .iter()
            .filter_map(|source| match Regex::new(&format!("(?i){source}")) {
                Ok(re) => Some((source.as_str(), re)),
                Err(err) => {
                    tracing::warn!(pattern = source, error = %err, "invalid sensitive pattern, skipping");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_compiles_all_patterns() {
        let policy = MemoryPolicy::default();
        assert_eq!(policy.compiled_patterns().len(), 3);
    }

    #[test]
    fn invalid_pattern_is_skipped_not_fatal() {
        let mut policy = MemoryPolicy::default();
        policy.sensitive_patterns = vec!["(unclosed".to_string(), r"\d+".to_string()];
        assert_eq!(policy.compiled_patterns().len(), 1);
    }
}
