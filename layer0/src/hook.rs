//! The Hook interface — observation and intervention in the turn pipeline.

use crate::error::HookError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Where in the turn pipeline a hook fires.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    /// Before each tool is executed, after authority/confirmation but
    /// before the sandboxed call.
    PreToolUse,
    /// After each tool completes, before the result enters memory.
    PostToolUse,
    /// At each turn exit-condition check (deadline, max steps, completion).
    ExitCheck,
}

/// What context is available to a hook at its firing point.
/// Read-only — hooks observe and decide, they don't mutate directly.
/// (Mutation happens via `HookAction::Modify*`.)
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookContext {
    /// Current hook point.
    pub point: HookPoint,
    /// Turn this event belongs to.
    pub turn_id: Option<String>,
    /// Current tool being called (only at Pre/PostToolUse).
    pub tool_name: Option<String>,
    /// Tool input (only at PreToolUse).
    pub tool_input: Option<serde_json::Value>,
    /// Tool result (only at PostToolUse).
    pub tool_result: Option<String>,
    /// Time elapsed since the turn started.
    pub elapsed: crate::duration::DurationMs,
}

impl HookContext {
    /// Create a new HookContext with only the hook point set.
    pub fn new(point: HookPoint) -> Self {
        Self {
            point,
            turn_id: None,
            tool_name: None,
            tool_input: None,
            tool_result: None,
            elapsed: crate::duration::DurationMs::ZERO,
        }
    }
}

/// What a hook decides to do.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HookAction {
    /// Continue normally.
    Continue,
    /// Halt the turn. The turn exits with an observer-halt exit reason.
    Halt {
        /// Reason for halting.
        reason: String,
    },
    /// Skip this tool call (only valid at PreToolUse).
    /// The tool is not executed and a synthetic "skipped by policy"
    /// result is backfilled.
    SkipTool {
        /// Reason for skipping.
        reason: String,
    },
    /// Modify the tool input before execution (only at PreToolUse).
    /// Used for parameter sanitization, injection of defaults.
    ModifyToolInput {
        /// The replacement tool input.
        new_input: serde_json::Value,
    },
    /// Replace the tool output with a modified version (e.g. redacted secrets).
    /// Only valid at PostToolUse.
    ModifyToolOutput {
        /// The replacement output.
        new_output: serde_json::Value,
    },
}

/// A hook that can observe and intervene in the turn pipeline.
///
/// Hooks are registered externally (by the state machine or executor)
/// and the runtime calls them at the defined points. The turn doesn't
/// know who's watching.
///
/// Hook handlers SHOULD complete quickly — they run inline in the
/// tool-call pipeline and add latency to every call they're registered
/// for. The performance cost is the hook author's responsibility.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Which points this hook fires at.
    fn points(&self) -> &[HookPoint];

    /// Called at each registered hook point.
    /// Returning an error does NOT halt the turn — it logs the error
    /// and continues. Use `HookAction::Halt` to halt.
    async fn on_event(&self, ctx: &HookContext) -> Result<HookAction, HookError>;
}
