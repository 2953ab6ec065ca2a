#![deny(missing_docs)]
//! # jarvis-planner — Planner Gate
//!
//! The planner itself (the LLM call) is an external collaborator. This
//! crate owns the boundary between its raw output and the rest of the
//! core: it parses the expected shape, rejects anything malformed, and
//! rejects any tool call naming a tool absent from the registry.
//!
//! `UNKNOWN_TOOL` is never retried by this gate — callers must surface it
//! as a classified planner-hallucination error, never silently re-prompt.

use jarvis_tool::ToolRegistry;
use jarvis_types::{Plan, PlanStatus, ToolCall};
use serde::Deserialize;

/// The structured shape the planner is expected to emit").
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerOutput {
    /// Optional chain-of-thought / scratch text, never surfaced downstream.
    #[serde(default)]
    pub thinking: Option<String>,
    /// Requested tool invocations, in order.
    #[serde(default)]
    pub tool_calls: Vec<RawToolCall>,
    /// A direct textual response, when the planner chose not to call tools.
    #[serde(default)]
    pub response: Option<String>,
}

/// One tool call as emitted by the planner, before gating.
#[derive(Debug, Clone, Deserialize)]
pub struct RawToolCall {
    /// The requested tool's name.
    pub tool: String,
    /// Raw JSON arguments.
    #[serde(default)]
    pub arguments: serde_json::Value,
    /// Optional planner-supplied justification.
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Validates raw planner output against the tool catalog and produces a
/// typed [`Plan`].
pub struct PlannerGate<'a> {
    registry: &'a ToolRegistry,
}

impl<'a> PlannerGate<'a> {
    /// Construct a gate bound to the given tool registry.
    pub fn new(registry: &'a ToolRegistry) -> Self {
        Self { registry }
    }

    /// Gate a raw JSON planner response into a typed [`Plan`].
    ///
    /// - Syntactically malformed input (does not match [`PlannerOutput`])
    ///   yields `status = INVALID_JSON`.
    /// - Any tool call naming a tool absent from the registry yields
    ///   `status = UNKNOWN_TOOL`.
    /// - A parsed output with neither tool calls nor a response yields
    ///   `status = VALIDATION_ERROR`.
    pub fn gate(&self, raw: &serde_json::Value) -> Plan {
        let output: PlannerOutput = match serde_json::from_value(raw.clone()) {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(error = %e, "planner output failed to parse");
                return Plan::rejected(
                    PlanStatus::InvalidJson,
                    format!("planner output did not match the expected shape: {e}"),
                );
            }
        };

        for call in &output.tool_calls {
            if self.registry.get(&call.tool).is_none() {
                tracing::warn!(tool = %call.tool, "planner named an unregistered tool");
                return Plan::rejected(
                    PlanStatus::UnknownTool,
                    format!("{} is not a registered tool", call.tool),
                );
            }
        }

        let has_response = output
            .response
            .as_deref()
            .map(|s| !s.is_empty())
            .unwrap_or(false);
        let has_tool_calls = !output.tool_calls.is_empty();

        if !has_response && !has_tool_calls {
            return Plan::rejected(
                PlanStatus::ValidationError,
                "plan contains neither tool calls nor a direct response",
            );
        }

        if has_tool_calls {
            Plan::tool_calls(
                output
                    .tool_calls
                    .into_iter()
                    .map(|c| ToolCall {
                        tool: c.tool,
                        arguments: c.arguments,
                        reasoning: c.reasoning,
                    })
                    .collect(),
            )
        } else {
            Plan::direct_response(output.response.unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarvis_types::{ParamType, ParameterSchema, ParameterSpec, PermissionLevel, ToolDefinition};
    use serde_json::json;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;

    struct NoopTool(ToolDefinition);
    impl jarvis_tool::ToolDyn for NoopTool {
        fn definition(&self) -> &ToolDefinition {
            &self.0
        }
        fn call(
            &self,
            _input: serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, jarvis_tool::ToolError>> + Send + '_>>
        {
            Box::pin(async { Ok(json!({})) })
        }
    }

    fn registry_with_get_current_time() -> ToolRegistry {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(NoopTool(ToolDefinition {
            name: "get_current_time".into(),
            description: "current time".into(),
            parameter_schema: ParameterSchema::empty(),
            permission_level: PermissionLevel::Read,
            timeout_seconds: 5,
            requires_confirmation: false,
            category: "system".into(),
        })));
        reg
    }

    #[test]
    fn known_tool_plan_is_valid() {
        let registry = registry_with_get_current_time();
        let gate = PlannerGate::new(&registry);
        let raw = json!({"tool_calls": [{"tool": "get_current_time", "arguments": {}}]});
        let plan = gate.gate(&raw);
        assert_eq!(plan.status, PlanStatus::Valid);
        assert_eq!(plan.tool_calls.len(), 1);
    }

    #[test]
    fn unknown_tool_is_rejected_and_never_retried() {
        let registry = registry_with_get_current_time();
        let gate = PlannerGate::new(&registry);
        let raw = json!({"tool_calls": [{"tool": "make_coffee", "arguments": {}}]});
        let plan = gate.gate(&raw);
        assert_eq!(plan.status, PlanStatus::UnknownTool);
        assert!(plan.tool_calls.is_empty());
    }

    #[test]
    fn malformed_output_is_invalid_json() {
        let registry = registry_with_get_current_time();
        let gate = PlannerGate::new(&registry);
        let raw = json!({"tool_calls": "not-an-array"});
        let plan = gate.gate(&raw);
        assert_eq!(plan.status, PlanStatus::InvalidJson);
    }

    #[test]
    fn empty_plan_is_validation_error() {
        let registry = registry_with_get_current_time();
        let gate = PlannerGate::new(&registry);
        let raw = json!({});
        let plan = gate.gate(&raw);
        assert_eq!(plan.status, PlanStatus::ValidationError);
    }

    #[test]
    fn direct_response_without_tool_calls_is_valid() {
        let registry = registry_with_get_current_time();
        let gate = PlannerGate::new(&registry);
        let raw = json!({"response": "Hello!"});
        let plan = gate.gate(&raw);
        assert_eq!(plan.status, PlanStatus::Valid);
        assert_eq!(plan.response_text.as_deref(), Some("Hello!"));
    }
}
