//! Sensitive-pattern redaction.

use crate::policy::MemoryPolicy;

/// Outcome of a single [`redact`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionResult {
    /// Length of the input content, in bytes.
    pub original_length: usize,
    /// Length of the redacted content, in bytes.
    pub redacted_length: usize,
    /// Total number of matches replaced, across all patterns.
    pub redaction_count: usize,
    /// Source pattern strings that matched at least once.
    pub patterns_matched: Vec<String>,
}

impl RedactionResult {
    /// Whether anything was actually redacted.
    pub fn was_redacted(&self) -> bool {
        self.redaction_count > 0
    }
}

/// Redact sensitive content from `content` according to `policy`.
///
/// Deterministic: the same input and policy always produce the same
/// output. Idempotent: redacting already-redacted content is a no-op,
/// since the placeholder text itself never matches a sensitive pattern.
pub fn redact(policy: &MemoryPolicy, content: &str) -> (String, RedactionResult) {
    if !policy.redact_on_store {
        return (
            content.to_string(),
            RedactionResult {
                original_length: content.len(),
                redacted_length: content.len(),
                redaction_count: 0,
                patterns_matched: Vec::new(),
            },
        );
    }

    let mut redacted = content.to_string();
    let mut patterns_matched = Vec::new();
    let mut count = 0;

    for (source, pattern) in policy.compiled_patterns() {
        let matches = pattern.find_iter(&redacted).count();
        if matches > 0 {
            count += matches;
            patterns_matched.push(source.to_string());
            redacted = pattern
                .replace_all(&redacted, policy.redaction_placeholder.as_str())
                .into_owned();
        }
    }

    let result = RedactionResult {
        original_length: content.len(),
        redacted_length: redacted.len(),
        redaction_count: count,
        patterns_matched,
    };

    (redacted, result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credit_card_is_redacted() {
        let policy = MemoryPolicy::default();
        let (redacted, result) = redact(&policy, "My card is 1234-5678-9012-3456");
        assert!(redacted.contains("[REDACTED]"));
        assert!(!redacted.contains("1234-5678-9012-3456"));
        assert!(result.was_redacted());
        assert_eq!(result.redaction_count, 1);
    }

    #[test]
    fn ssn_is_redacted() {
        let policy = MemoryPolicy::default();
        let (redacted, _) = redact(&policy, "SSN: 123-45-6789");
        assert!(redacted.contains("[REDACTED]"));
        assert!(!redacted.contains("123-45-6789"));
    }

    #[test]
    fn clean_content_is_unchanged() {
        let policy = MemoryPolicy::default();
        let (redacted, result) = redact(&policy, "Just a normal message");
        assert_eq!(redacted, "Just a normal message");
        assert!(!result.was_redacted());
        assert_eq!(result.redaction_count, 0);
    }

    #[test]
    fn multiple_patterns_in_one_message_are_all_redacted() {
        let policy = MemoryPolicy::default();
        let (redacted, result) =
            redact(&policy, "Card: 1234-5678-9012-3456, SSN: 123-45-6789");
        assert_eq!(result.redaction_count, 2);
        assert!(!redacted.contains("1234"));
        assert!(!redacted.contains("6789"));
    }

    #[test]
    fn disabled_redaction_passes_content_through() {
        let mut policy = MemoryPolicy::default();
        policy.redact_on_store = false;
        let (redacted, result) = redact(&policy, "Card: 1234-5678-9012-3456");
        assert_eq!(redacted, "Card: 1234-5678-9012-3456");
        assert!(!result.was_redacted());
    }

    #[test]
    fn redaction_is_idempotent() {
        let policy = MemoryPolicy::default();
        let (once, _) = redact(&policy, "Card: 1234-5678-9012-3456");
        let (twice, result_twice) = redact(&policy, &once);
        assert_eq!(once, twice);
        assert_eq!(result_twice.redaction_count, 0);
    }
}
