//! The executor: the single entry point through which every tool
//! effect runs.

use std::time::{Duration, Instant};

use jarvis_authority::{Authority, ConfirmationOutcome, ConfirmationWorkflow, Decision, DecisionStatus};
use jarvis_circuit::CircuitBreakerRegistry;
use jarvis_degradation::HealthMonitor;
use jarvis_tool::{ToolError, ToolRegistry};
use jarvis_types::{classify, ClassifyHint, GrantSource, JarvisError, PendingConfirmation, PermissionLevel};
use serde_json::Value;

/// Outcome classification for one [`Executor::execute`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// The tool ran and returned a result.
    Success,
    /// No tool is registered under that name.
    UnknownTool,
    /// Arguments failed schema validation.
    ValidationError,
    /// Authority denied the call outright.
    PermissionDenied,
    /// Authority requires interactive confirmation and none was given.
    ConfirmationRequired,
    /// The caller (or the approval function) denied the confirmation.
    ConfirmationDenied,
    /// The pending confirmation expired before it was resolved.
    ConfirmationTimeout,
    /// The tool exceeded its wall-clock timeout.
    Timeout,
    /// The tool ran and failed, or a sandbox/circuit-breaker rule
    /// stopped it before it could run.
    ExecutionError,
}

/// Result of a single `execute` call.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// What happened.
    pub status: ExecutionStatus,
    /// The tool's return value, present only on `Success`.
    pub output: Option<Value>,
    /// Classified error, present on any non-success, non-pending status.
    pub error: Option<JarvisError>,
    /// Present when `status` is `ConfirmationRequired`: the caller must
    /// resolve this out-of-band via [`Executor::confirm_pending`].
    pub pending: Option<PendingConfirmation>,
    /// Wall-clock time spent in this call.
    pub duration: Duration,
}

impl ExecutionResult {
    fn new(status: ExecutionStatus, duration: Duration) -> Self {
        Self { status, output: None, error: None, pending: None, duration }
    }

    fn success(output: Value, duration: Duration) -> Self {
        Self { output: Some(output), ..Self::new(ExecutionStatus::Success, duration) }
    }

    fn failure(status: ExecutionStatus, error: JarvisError, duration: Duration) -> Self {
        Self { error: Some(error), ..Self::new(status, duration) }
    }

    fn pending(pending: PendingConfirmation, duration: Duration) -> Self {
        Self { pending: Some(pending), ..Self::new(ExecutionStatus::ConfirmationRequired, duration) }
    }
}

/// A `TOOL_EXECUTE` audit record, emitted only once a tool call has
/// actually run (or timed out mid-run) — never for a rejection at steps
/// 1 through 4.
#[derive(Debug, Clone)]
pub struct ToolExecuteEntry {
    /// Tool invoked.
    pub tool_name: String,
    /// Turn this call belongs to.
    pub turn_id: String,
    /// One of `success`, `timeout`, `error`.
    pub action: &'static str,
    /// How long the call took.
    pub duration: Duration,
    /// The resulting status.
    pub status: ExecutionStatus,
}

/// An `AUTHORITY_CHECK` audit record, emitted once per [`Authority::check`]
/// call the executor makes, regardless of the resulting decision.
#[derive(Debug, Clone)]
pub struct AuthorityCheckEntry {
    /// Tool the decision concerns.
    pub tool_name: String,
    /// Turn this check belongs to.
    pub turn_id: String,
    /// The permission level the tool required.
    pub required_level: PermissionLevel,
    /// The gated outcome.
    pub status: DecisionStatus,
}

/// A `CONFIRM_RESPONSE` audit record, emitted once a pending confirmation
/// resolves, whatever the outcome.
#[derive(Debug, Clone)]
pub struct ConfirmResponseEntry {
    /// Id of the confirmation that resolved.
    pub confirmation_id: String,
    /// Tool the confirmation concerned.
    pub tool_name: String,
    /// Turn this confirmation belongs to.
    pub turn_id: String,
    /// How it resolved.
    pub outcome: ConfirmationOutcome,
}

/// A `GRANT_CREATED` audit record, emitted when approving a confirmation
/// creates a session grant.
#[derive(Debug, Clone)]
pub struct GrantCreatedEntry {
    /// Tool the grant authorizes.
    pub tool_name: String,
    /// Turn the approval happened in.
    pub turn_id: String,
    /// Level the grant authorizes.
    pub level: PermissionLevel,
    /// Where the grant came from.
    pub source: GrantSource,
}

/// A `GRANT_REVOKED` audit record, emitted when an authority check
/// consumes (and so revokes) a one-time grant.
#[derive(Debug, Clone)]
pub struct GrantRevokedEntry {
    /// Tool the revoked grant had authorized.
    pub tool_name: String,
    /// Turn the consuming check happened in.
    pub turn_id: String,
}

/// Sink for the audit entries the executor is responsible for. Kept as a
/// narrow trait rather than a hard dependency on the audit crate so the
/// executor doesn't need to know how entries are persisted or chained.
pub trait AuditSink: Send + Sync {
    /// Record a `TOOL_EXECUTE` entry.
    fn record_tool_execute(&self, entry: ToolExecuteEntry);
    /// Record an `AUTHORITY_CHECK` entry.
    fn record_authority_check(&self, entry: AuthorityCheckEntry);
    /// Record a `CONFIRM_RESPONSE` entry.
    fn record_confirm_response(&self, entry: ConfirmResponseEntry);
    /// Record a `GRANT_CREATED` entry.
    fn record_grant_created(&self, entry: GrantCreatedEntry);
    /// Record a `GRANT_REVOKED` entry.
    fn record_grant_revoked(&self, entry: GrantRevokedEntry);
}

/// An [`AuditSink`] that discards everything; useful for tests and for
/// callers that audit at a different layer.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_tool_execute(&self, _entry: ToolExecuteEntry) {}
    fn record_authority_check(&self, _entry: AuthorityCheckEntry) {}
    fn record_confirm_response(&self, _entry: ConfirmResponseEntry) {}
    fn record_grant_created(&self, _entry: GrantCreatedEntry) {}
    fn record_grant_revoked(&self, _entry: GrantRevokedEntry) {}
}

/// A synchronous approval callback for confirmation requests, matching
/// the "caller-supplied synchronous approval function" path.
pub type ApproveFn<'a> = dyn Fn(&PendingConfirmation) -> bool + Send + Sync + 'a;

/// Wires together the registry, authority, circuit breakers, and health
/// monitor behind a single `execute` entry point.
pub struct Executor<'a> {
    registry: &'a ToolRegistry,
    authority: &'a Authority,
    confirmations: ConfirmationWorkflow<'a>,
    circuits: &'a CircuitBreakerRegistry,
    health: &'a HealthMonitor,
    audit: &'a dyn AuditSink,
}

impl<'a> Executor<'a> {
    /// Construct an executor over the given subsystems.
    pub fn new(
        registry: &'a ToolRegistry,
        authority: &'a Authority,
        circuits: &'a CircuitBreakerRegistry,
        health: &'a HealthMonitor,
        audit: &'a dyn AuditSink,
    ) -> Self {
        Self { registry, authority, confirmations: ConfirmationWorkflow::new(authority), circuits, health, audit }
    }

    /// Resolve a previously issued pending confirmation, granting or
    /// denying per [`ConfirmationWorkflow::confirm_pending`]. Does not
    /// run the tool; callers re-invoke [`Executor::execute`] after a
    /// successful approval. Always emits a `CONFIRM_RESPONSE` entry, and
    /// a `GRANT_CREATED` entry on approval.
    pub fn confirm_pending(&self, id: &str, approved: bool, level: PermissionLevel) -> ConfirmationOutcome {
        self.resolve_confirmation(id, approved, level)
    }

    fn resolve_confirmation(&self, id: &str, approved: bool, level: PermissionLevel) -> ConfirmationOutcome {
        let pending = self.confirmations.get(id);
        let outcome = self.confirmations.confirm_pending(id, approved, level);
        let (tool_name, turn_id) =
            pending.map(|p| (p.tool_name, p.turn_id)).unwrap_or_else(|| ("unknown".to_string(), "-".to_string()));

        self.audit.record_confirm_response(ConfirmResponseEntry {
            confirmation_id: id.to_string(),
            tool_name: tool_name.clone(),
            turn_id: turn_id.clone(),
            outcome: outcome.clone(),
        });

        if outcome == ConfirmationOutcome::Approved {
            self.audit.record_grant_created(GrantCreatedEntry {
                tool_name,
                turn_id,
                level,
                source: GrantSource::Session,
            });
        }

        outcome
    }

    /// Run the mandatory 8-step execution sequence for one tool call.
    pub async fn execute(
        &self,
        tool_name: &str,
        args: Value,
        turn_id: &str,
        approve_fn: Option<&ApproveFn<'_>>,
    ) -> ExecutionResult {
        let start = Instant::now();

        // 1. Resolve tool.
        let Some(tool) = self.registry.get(tool_name) else {
            return self.reject(ExecutionStatus::UnknownTool, None, start);
        };
        let definition = tool.definition().clone();

        // 2. Validate args.
        if let Err(err) = self.registry.validate_call(tool_name, &args) {
            let classified = classify(ClassifyHint::Validation, tool_name, err.to_string());
            return self.reject(ExecutionStatus::ValidationError, Some(classified), start);
        }

        // 3. Authority check. Audited regardless of outcome.
        let decision = self.authority.check(tool_name, definition.permission_level);
        self.emit_authority_check(tool_name, turn_id, &decision);

        // 4. Confirmation workflow if required.
        if decision.status == DecisionStatus::RequiresConfirmation {
            let pending = self.confirmations.request(tool_name, args.clone(), turn_id);
            let Some(approve_fn) = approve_fn else {
                return ExecutionResult::pending(pending, start.elapsed());
            };
            let approved = approve_fn(&pending);
            match self.resolve_confirmation(&pending.id, approved, definition.permission_level) {
                ConfirmationOutcome::Denied => {
                    return self.reject(
                        ExecutionStatus::ConfirmationDenied,
                        Some(classify(ClassifyHint::Permission, tool_name, "confirmation denied")),
                        start,
                    );
                }
                ConfirmationOutcome::Timeout => {
                    return self.reject(
                        ExecutionStatus::ConfirmationTimeout,
                        Some(classify(ClassifyHint::Permission, tool_name, "confirmation timed out")),
                        start,
                    );
                }
                ConfirmationOutcome::NotFound => {
                    return self.finish(
                        ExecutionStatus::ExecutionError,
                        Some(classify(ClassifyHint::Unknown, tool_name, "confirmation vanished before resolution")),
                        tool_name,
                        turn_id,
                        start,
                    );
                }
                ConfirmationOutcome::Approved => {}
            }
        } else if decision.status != DecisionStatus::Granted {
            return self.reject(
                ExecutionStatus::PermissionDenied,
                Some(classify(ClassifyHint::Permission, tool_name, format!("{:?}", decision.status))),
                start,
            );
        }

        // 5. Circuit-breaker gate.
        if let Err(open) = self.circuits.gate(tool_name) {
            let classified = classify(ClassifyHint::Unknown, tool_name, open.to_string());
            return self.finish(ExecutionStatus::ExecutionError, Some(classified), tool_name, turn_id, start);
        }

        // 6. Run with a hard wall-clock timeout.
        let timeout = Duration::from_secs(definition.timeout_seconds);
        let call_result = tokio::time::timeout(timeout, tool.call(args)).await;

        let outcome = match call_result {
            Err(_elapsed) => {
                self.circuits.record_failure(tool_name);
                self.health.record_call(tool_name, start.elapsed(), true);
                let classified = classify(
                    ClassifyHint::Timeout,
                    tool_name,
                    format!("tool '{tool_name}' timed out after {}s", definition.timeout_seconds),
                );
                self.finish(ExecutionStatus::Timeout, Some(classified), tool_name, turn_id, start)
            }
            // 7. Classify any tool error; record circuit breaker + health outcome.
            Ok(Err(tool_error)) => {
                self.circuits.record_failure(tool_name);
                self.health.record_call(tool_name, start.elapsed(), true);
                let classified = classify_tool_error(&tool_error, tool_name);
                self.finish(ExecutionStatus::ExecutionError, Some(classified), tool_name, turn_id, start)
            }
            Ok(Ok(value)) => {
                self.circuits.record_success(tool_name);
                self.health.record_call(tool_name, start.elapsed(), false);
                let duration = start.elapsed();
                self.emit(tool_name, turn_id, "success", duration, ExecutionStatus::Success);
                ExecutionResult::success(value, duration)
            }
        };

        outcome
    }

    /// Finish steps 1–4: the tool never ran, so no `TOOL_EXECUTE` entry is
    /// emitted.
    fn reject(&self, status: ExecutionStatus, error: Option<JarvisError>, start: Instant) -> ExecutionResult {
        let duration = start.elapsed();
        match error {
            Some(err) => ExecutionResult::failure(status, err, duration),
            None => ExecutionResult::new(status, duration),
        }
    }

    /// Finish steps 5–8: the tool ran, was stopped at the circuit-breaker
    /// gate, or timed out mid-run — in every case a `TOOL_EXECUTE` entry
    /// belongs in the audit trail.
    fn finish(
        &self,
        status: ExecutionStatus,
        error: Option<JarvisError>,
        tool_name: &str,
        turn_id: &str,
        start: Instant,
    ) -> ExecutionResult {
        let duration = start.elapsed();
        let action = match status {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Timeout => "timeout",
            _ => "error",
        };
        self.emit(tool_name, turn_id, action, duration, status.clone());
        match error {
            Some(err) => ExecutionResult::failure(status, err, duration),
            None => ExecutionResult::new(status, duration),
        }
    }

    fn emit(&self, tool_name: &str, turn_id: &str, action: &'static str, duration: Duration, status: ExecutionStatus) {
        tracing::debug!(tool = tool_name, turn_id, action, duration_ms = duration.as_millis() as u64, "tool_execute");
        self.audit.record_tool_execute(ToolExecuteEntry {
            tool_name: tool_name.to_string(),
            turn_id: turn_id.to_string(),
            action,
            duration,
            status,
        });
    }

    fn emit_authority_check(&self, tool_name: &str, turn_id: &str, decision: &Decision) {
        tracing::debug!(tool = tool_name, turn_id, status = ?decision.status, "authority_check");
        self.audit.record_authority_check(AuthorityCheckEntry {
            tool_name: tool_name.to_string(),
            turn_id: turn_id.to_string(),
            required_level: decision.required_level,
            status: decision.status.clone(),
        });
        if decision.consumed_one_time {
            self.audit.record_grant_revoked(GrantRevokedEntry {
                tool_name: tool_name.to_string(),
                turn_id: turn_id.to_string(),
            });
        }
    }
}

fn classify_tool_error(error: &ToolError, tool_name: &str) -> JarvisError {
    match error {
        ToolError::NotFound => classify(ClassifyHint::Unknown, tool_name, error.to_string()),
        ToolError::ValidationFailed(_) => classify(ClassifyHint::Validation, tool_name, error.to_string()),
        ToolError::ExecutionFailed(_) | ToolError::Other(_) => {
            classify(ClassifyHint::Unknown, tool_name, error.to_string())
        }
    }
}
