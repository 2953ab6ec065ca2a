//! The closed error taxonomy every crate in this workspace converts into
//! at the executor boundary. No raw exception type escapes the core.

use serde::{Deserialize, Serialize};

/// The closed set of error categories. Every tool-facing failure is
/// classified into exactly one of these before it crosses the executor
/// boundary — see [`crate::ErrorCategory::max_retries`] for the static
/// per-category retry policy.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// A tool's own execution failed for reasons internal to the tool.
    ToolFailure,
    /// Arguments or schema validation rejected the call.
    ValidationError,
    /// The planner/LLM backend itself failed (timeout, 5xx, malformed output).
    LlmFailure,
    /// The planner named a tool or argument that does not exist. Never retried.
    LlmHallucination,
    /// Authority denied the call.
    PermissionError,
    /// A network/OS-class fault (connection refused, DNS failure, I/O error).
    NetworkError,
    /// The tool call exceeded its wall-clock timeout.
    TimeoutError,
    /// An internal invariant violation. Non-recoverable.
    SystemError,
    /// Bad input from the user that no retry would fix.
    UserError,
}

impl ErrorCategory {
    /// Static retry budget for this category.
    pub fn max_retries(self) -> u32 {
        match self {
            ErrorCategory::ToolFailure => 2,
            ErrorCategory::ValidationError => 0,
            ErrorCategory::LlmFailure => 1,
            ErrorCategory::LlmHallucination => 0,
            ErrorCategory::PermissionError => 0,
            ErrorCategory::NetworkError => 3,
            ErrorCategory::TimeoutError => 1,
            ErrorCategory::SystemError => 0,
            ErrorCategory::UserError => 0,
        }
    }

    /// Whether this category is ever recoverable within the same turn.
    /// `SYSTEM_ERROR` and `LLM_HALLUCINATION` are non-recoverable.
    pub fn recoverable(self) -> bool {
        !matches!(
            self,
            ErrorCategory::SystemError | ErrorCategory::LlmHallucination
        )
    }

    /// Fixed user-facing message keyed by category, from a static table.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorCategory::ToolFailure => "That didn't work. Let me try something else.",
            ErrorCategory::ValidationError => "I didn't understand one of those arguments.",
            ErrorCategory::LlmFailure => "I'm having trouble thinking right now.",
            ErrorCategory::LlmHallucination => {
                "I got confused. Let me try a different approach."
            }
            ErrorCategory::PermissionError => "I'm not allowed to do that right now.",
            ErrorCategory::NetworkError => "I couldn't reach the network.",
            ErrorCategory::TimeoutError => "That took too long, so I stopped.",
            ErrorCategory::SystemError => "Something went wrong internally.",
            ErrorCategory::UserError => "I couldn't make sense of that request.",
        }
    }
}

/// A classified error that has crossed the executor boundary.
///
/// This is the only error shape downstream layers (state machine,
/// front-end) ever see — raw tool/provider errors are translated into
/// this at the executor — the only place a raw runtime fault gets
/// translated into a classified error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JarvisError {
    /// The closed category this error belongs to.
    pub category: ErrorCategory,
    /// Human-readable internal message (not shown to the user directly).
    pub message: String,
    /// Structured extra context, if any.
    pub details: Option<serde_json::Value>,
    /// When the error was classified.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Optional backtrace-ish text captured at classification time.
    pub stack: Option<String>,
    /// Whether this specific instance is recoverable. Defaults to the
    /// category's general recoverability but may be narrowed per-instance.
    pub recoverable: bool,
}

impl JarvisError {
    /// Construct a classified error with the category's default
    /// recoverability and no details/stack.
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            details: None,
            timestamp: chrono::Utc::now(),
            stack: None,
            recoverable: category.recoverable(),
        }
    }

    /// Attach structured details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach a captured stack/context string.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// The fixed user-facing message for this error's category.
    pub fn user_message(&self) -> &'static str {
        self.category.user_message()
    }
}

impl std::fmt::Display for JarvisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.category, self.message)
    }
}

impl std::error::Error for JarvisError {}

/// Classify a raw executor-side fault into a [`JarvisError`].
///
/// `kind_hint` narrows classification when the caller already knows the
/// fault's shape (e.g. a timeout future firing vs. a tool-internal panic).
pub fn classify(kind_hint: ClassifyHint, tool_name: &str, message: impl Into<String>) -> JarvisError {
    let category = match kind_hint {
        ClassifyHint::Timeout => ErrorCategory::TimeoutError,
        ClassifyHint::Permission => ErrorCategory::PermissionError,
        ClassifyHint::Network => ErrorCategory::NetworkError,
        ClassifyHint::Validation => ErrorCategory::ValidationError,
        ClassifyHint::Unknown => ErrorCategory::ToolFailure,
    };
    JarvisError::new(category, message.into())
        .with_details(serde_json::json!({ "tool_name": tool_name }))
}

/// Coarse hint for [`classify`], supplied by the executor based on where
/// in its pipeline the fault originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifyHint {
    /// The tool's future did not resolve before the timeout.
    Timeout,
    /// The fault looks like a permission/authorization failure.
    Permission,
    /// The fault looks like a network/OS-level failure.
    Network,
    /// The fault looks like a value/type validation failure.
    Validation,
    /// No better information is available.
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_budget_matches_spec_table() {
        assert_eq!(ErrorCategory::ToolFailure.max_retries(), 2);
        assert_eq!(ErrorCategory::ValidationError.max_retries(), 0);
        assert_eq!(ErrorCategory::LlmFailure.max_retries(), 1);
        assert_eq!(ErrorCategory::LlmHallucination.max_retries(), 0);
        assert_eq!(ErrorCategory::PermissionError.max_retries(), 0);
        assert_eq!(ErrorCategory::NetworkError.max_retries(), 3);
        assert_eq!(ErrorCategory::TimeoutError.max_retries(), 1);
        assert_eq!(ErrorCategory::SystemError.max_retries(), 0);
        assert_eq!(ErrorCategory::UserError.max_retries(), 0);
    }

    #[test]
    fn system_error_and_hallucination_are_non_recoverable() {
        assert!(!ErrorCategory::SystemError.recoverable());
        assert!(!ErrorCategory::LlmHallucination.recoverable());
        assert!(ErrorCategory::NetworkError.recoverable());
    }

    #[test]
    fn classify_timeout_produces_timeout_error() {
        let err = classify(ClassifyHint::Timeout, "get_current_time", "deadline exceeded");
        assert_eq!(err.category, ErrorCategory::TimeoutError);
        assert_eq!(
            err.details.unwrap()["tool_name"],
            serde_json::json!("get_current_time")
        );
    }

    #[test]
    fn jarvis_error_display_includes_category_and_message() {
        let err = JarvisError::new(ErrorCategory::NetworkError, "connection refused");
        assert!(err.to_string().contains("NetworkError"));
        assert!(err.to_string().contains("connection refused"));
    }
}
