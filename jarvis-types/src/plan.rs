//! Planner output, gated into a typed [`Plan`].

use serde::{Deserialize, Serialize};

/// One tool invocation requested by the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// The tool's registered name.
    pub tool: String,
    /// Raw JSON arguments as produced by the planner.
    pub arguments: serde_json::Value,
    /// Optional planner-provided justification, carried through for audit
    /// details but never used for control flow.
    pub reasoning: Option<String>,
}

/// The gated status of a plan. Exactly one of these holds after the
/// planner gate has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    /// Well-formed: either a direct response or a fully registry-resolvable
    /// tool call list.
    Valid,
    /// The planner's raw output did not parse as the expected shape.
    InvalidJson,
    /// A tool call named a tool absent from the registry. Never retried.
    UnknownTool,
    /// The plan parsed but contains neither tool calls nor a response.
    ValidationError,
}

/// The gate's typed output.
///
/// Invariant: `status == Valid` iff `response_text` is non-empty OR
/// `tool_calls` is non-empty and every tool name resolves in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// The gated status.
    pub status: PlanStatus,
    /// Tool calls to execute, in order. Empty unless `status == Valid`.
    pub tool_calls: Vec<ToolCall>,
    /// A direct text response with no tool calls, if the planner chose to
    /// answer directly.
    pub response_text: Option<String>,
    /// Human-readable reason when `status != Valid`.
    pub error: Option<String>,
}

impl Plan {
    /// A valid plan carrying only a direct response.
    pub fn direct_response(text: impl Into<String>) -> Self {
        Self {
            status: PlanStatus::Valid,
            tool_calls: Vec::new(),
            response_text: Some(text.into()),
            error: None,
        }
    }

    /// A valid plan carrying one or more tool calls.
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            status: PlanStatus::Valid,
            tool_calls: calls,
            response_text: None,
            error: None,
        }
    }

    /// A rejected plan with the given status and reason.
    pub fn rejected(status: PlanStatus, reason: impl Into<String>) -> Self {
        debug_assert_ne!(status, PlanStatus::Valid, "rejected plans must not be Valid");
        Self {
            status,
            tool_calls: Vec::new(),
            response_text: None,
            error: Some(reason.into()),
        }
    }
}
