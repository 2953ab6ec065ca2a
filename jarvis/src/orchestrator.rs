//! The orchestrator: owns every long-lived subsystem and sequences one
//! turn end-to-end behind the front-end contract.

use std::sync::{Arc, Weak};

use jarvis_audit::{Actor, AuditLog, EventType};
use jarvis_authority::Authority;
use jarvis_circuit::CircuitBreakerRegistry;
use jarvis_config::PermissionConfig;
use jarvis_degradation::{DegradationManager, FailureBudget, HealthMonitor};
use jarvis_memory::{MemoryGovernor, MemoryPolicy};
use jarvis_persistence::Database;
use jarvis_planner::PlannerGate;
use jarvis_scheduler::{Dispatcher, Scheduler};
use jarvis_tool::ToolRegistry;
use jarvis_turn::{StateMachine, TurnContext, TurnState};
use jarvis_types::{ErrorCategory, GrantSource, Plan, PlanStatus};
use layer0::TurnId;

use crate::audit_bridge::{ExecutorAuditBridge, MemoryAuditBridge};
use crate::bus::{BusError, EventSlot};
use crate::planner::{PlannerClient, PlannerRequest};

/// Every long-lived subsystem the orchestrator owns for its process
/// lifetime. Turn-scoped objects (failure budget, pending confirmations)
/// are constructed fresh per turn and disposed at `TURN_END`.
pub struct JarvisInner {
    registry: ToolRegistry,
    authority: Authority,
    circuits: CircuitBreakerRegistry,
    health: HealthMonitor,
    degradation: DegradationManager,
    state_machine: StateMachine,
    db: Database,
    memory_policy: MemoryPolicy,
    scheduler: Arc<Scheduler>,
    planner: Arc<dyn PlannerClient>,
    on_transcription: EventSlot<String>,
    on_command: EventSlot<String>,
    on_result: EventSlot<Option<String>>,
}

/// User-facing entry point: owns an `Arc<JarvisInner>` so it, the
/// scheduler's dispatcher, and any spawned background work all share the
/// same long-lived state.
#[derive(Clone)]
pub struct Jarvis {
    inner: Arc<JarvisInner>,
}

struct OrchestratorDispatcher(Weak<JarvisInner>);

impl Dispatcher for OrchestratorDispatcher {
    fn dispatch<'a>(
        &'a self,
        action_text: &'a str,
        turn_id: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async move {
            let Some(inner) = self.0.upgrade() else {
                return None;
            };
            inner.process_text(action_text, TurnId::new(turn_id.to_string())).await
        })
    }
}

impl Jarvis {
    /// Build the orchestrator: seed default grants from `permissions`,
    /// wire the scheduler's dispatcher back into this instance via a
    /// weak reference, and start with no tools or tasks registered.
    pub fn new(
        registry: ToolRegistry,
        permissions: PermissionConfig,
        db: Database,
        planner: Arc<dyn PlannerClient>,
    ) -> Self {
        let blocked: std::collections::HashSet<_> = permissions.always_blocked.iter().copied().collect();
        let confirm_required: std::collections::HashSet<_> =
            permissions.requires_confirmation.iter().copied().collect();
        let authority = Authority::new(blocked, confirm_required);
        {
            let audit = AuditLog::new(&db);
            for grant in &permissions.default_grants {
                let record = authority.grant(grant.target.clone(), grant.level, None, false, GrantSource::Default);
                let details = serde_json::json!({
                    "level": format!("{:?}", record.level),
                    "source": format!("{:?}", record.source),
                });
                if let Err(e) = audit.log(
                    EventType::GrantCreated,
                    Actor::Authority,
                    "grant_created",
                    TurnContext::current_or_dash(),
                    Some(record.target.clone()),
                    Some(details),
                ) {
                    tracing::error!(error = %e, "failed to append GRANT_CREATED audit entry");
                }
            }
        }

        let inner = Arc::new_cyclic(|weak: &Weak<JarvisInner>| {
            let dispatcher: Arc<dyn Dispatcher> = Arc::new(OrchestratorDispatcher(weak.clone()));
            let scheduler = Arc::new(Scheduler::new(dispatcher));
            JarvisInner {
                registry,
                authority,
                circuits: CircuitBreakerRegistry::new(),
                health: HealthMonitor::new(),
                degradation: DegradationManager::new(),
                state_machine: StateMachine::new(),
                db,
                memory_policy: MemoryPolicy::default(),
                scheduler,
                planner,
                on_transcription: EventSlot::default(),
                on_command: EventSlot::default(),
                on_result: EventSlot::default(),
            }
        });

        Self { inner }
    }

    /// Start the scheduler's background dispatch loop.
    pub fn start_listening(&self) {
        self.inner.scheduler.start();
        tracing::info!("jarvis listening");
    }

    /// Stop accepting new turns and return to idle.
    pub fn stop_listening(&self) -> Option<String> {
        self.inner.state_machine.reset("stop_listening requested");
        None
    }

    /// Process `text` synchronously as if typed by the user, minting a
    /// fresh turn id for it.
    pub async fn process_text_directly(&self, text: &str) -> Option<String> {
        let turn_id = TurnContext::generate_id();
        self.inner.process_text(text, turn_id).await
    }

    /// A snapshot of orchestrator health: turn state, per-component
    /// health, and the number of tools registered.
    pub fn get_status(&self) -> serde_json::Value {
        let health = self.inner.health.summary();
        serde_json::json!({
            "state": format!("{:?}", self.inner.state_machine.current()),
            "busy": self.inner.state_machine.is_busy(),
            "health": format!("{:?}", health),
            "tool_count": self.inner.registry.len(),
        })
    }

    /// Release scheduler resources. Any in-flight turn is left to finish;
    /// the state machine is reset to `IDLE` so a fresh process isn't left
    /// looking busy.
    pub fn shutdown(&self) {
        self.inner.state_machine.reset("shutdown requested");
        tracing::info!("jarvis shutting down");
    }

    /// Register a callback fired with raw transcribed text, before
    /// planning begins.
    pub fn on_transcription(&self, f: impl Fn(String) + Send + Sync + 'static) {
        self.inner.on_transcription.set(f);
    }

    /// Register a callback fired with the text about to be planned over.
    pub fn on_command(&self, f: impl Fn(String) + Send + Sync + 'static) {
        self.inner.on_command.set(f);
    }

    /// Register a callback fired with the turn's final response text, if
    /// any.
    pub fn on_result(&self, f: impl Fn(Option<String>) + Send + Sync + 'static) {
        self.inner.on_result.set(f);
    }

    /// Erase all governed memory. Logged through the same audit chain as
    /// every other governance action.
    pub fn forget_all(&self) -> serde_json::Value {
        let audit = AuditLog::new(&self.inner.db);
        let bridge = MemoryAuditBridge::new(&audit);
        let governor = MemoryGovernor::new(self.inner.memory_policy.clone(), &bridge);
        let result = governor.forget_all(TurnContext::try_current().map(|id| id.to_string()));
        serde_json::json!({ "items_deleted": result.items_deleted, "reason": result.reason })
    }

    /// Erase memory scoped to one conversation.
    pub fn forget_conversation(&self, conversation_id: &str) -> serde_json::Value {
        let audit = AuditLog::new(&self.inner.db);
        let bridge = MemoryAuditBridge::new(&audit);
        let governor = MemoryGovernor::new(self.inner.memory_policy.clone(), &bridge);
        let result =
            governor.forget_conversation(conversation_id, TurnContext::try_current().map(|id| id.to_string()));
        serde_json::json!({ "items_deleted": result.items_deleted, "reason": result.reason })
    }

    /// A summary of the active memory policy and governance activity, for
    /// a "what do you remember?" style command.
    pub fn memory_summary(&self) -> serde_json::Value {
        let audit = AuditLog::new(&self.inner.db);
        let bridge = MemoryAuditBridge::new(&audit);
        let governor = MemoryGovernor::new(self.inner.memory_policy.clone(), &bridge);
        governor.get_memory_summary()
    }

    /// Export `[from_id, to_id]` of the audit chain in the stable bundle
    /// format, for an external reviewer to verify independently.
    pub fn export_audit_bundle(&self, from_id: i64, to_id: Option<i64>) -> jarvis_audit::AuditBundle {
        AuditLog::new(&self.inner.db).export_bundle(from_id, to_id)
    }
}

impl JarvisInner {
    /// The full per-turn control flow: mint/propagate the turn id,
    /// transition through the lifecycle state machine, plan, authority-
    /// and confirmation-gate each tool call, execute, and audit every
    /// step. Errors are classified and logged; nothing here returns a
    /// raw exception type to the front-end.
    async fn process_text(&self, text: &str, turn_id: TurnId) -> Option<String> {
        let turn_id_string = turn_id.to_string();
        TurnContext::enter(turn_id, self.run_turn(text, turn_id_string)).await
    }

    async fn run_turn(&self, text: &str, turn_id: String) -> Option<String> {
        let audit = AuditLog::new(&self.db);

        if let Err(e) = audit.log(EventType::TurnStart, Actor::User, "turn_start", turn_id.clone(), None, None) {
            tracing::error!(error = %e, "failed to append TURN_START audit entry");
        }

        if let Err(e) = self.state_machine.transition(TurnState::Planning, "planning") {
            tracing::warn!(error = %e, "could not enter PLANNING; resetting");
            self.state_machine.reset("invalid transition into planning");
        }

        if let Err(BusError::ListenerPanicked(msg)) = self.on_command.emit(text.to_string()) {
            tracing::warn!(error = msg, "on_command listener panicked");
        }

        let schemas = serde_json::Value::Array(self.registry.export_schemas_for_planner());
        let raw = match self.planner.plan(PlannerRequest { text, tool_schemas: schemas, turn_id: &turn_id }).await {
            Ok(raw) => raw,
            Err(err) => {
                self.state_machine.reset("planner backend failed");
                let _ = audit.log(
                    EventType::PlanCreated,
                    Actor::Planner,
                    "planner_unavailable",
                    turn_id.clone(),
                    None,
                    Some(serde_json::json!({ "message": err.message })),
                );
                return self.finish_turn(&audit, turn_id, None, Some(err.user_message().to_string()));
            }
        };

        let gate = PlannerGate::new(&self.registry);
        let plan = gate.gate(&raw);
        let _ = audit.log(
            EventType::PlanCreated,
            Actor::Planner,
            "plan_created",
            turn_id.clone(),
            None,
            Some(serde_json::json!({ "status": format!("{:?}", plan.status) })),
        );

        if plan.status != PlanStatus::Valid {
            self.state_machine.reset("plan was not valid");
            let message = ErrorCategory::LlmHallucination.user_message().to_string();
            return self.finish_turn(&audit, turn_id, None, Some(message));
        }

        if let Err(e) = self.state_machine.transition(TurnState::Executing, "executing plan") {
            tracing::warn!(error = %e, "could not enter EXECUTING");
        }

        let response = self.run_plan(&plan, &audit, &turn_id).await;

        if let Err(e) = self.state_machine.transition(TurnState::Responding, "responding") {
            tracing::warn!(error = %e, "could not enter RESPONDING");
        }
        self.state_machine.reset("turn complete");

        self.finish_turn(&audit, turn_id, response, None)
    }

    async fn run_plan(&self, plan: &Plan, audit: &AuditLog<'_>, turn_id: &str) -> Option<String> {
        if !plan.tool_calls.is_empty() {
            return self.run_tool_calls(plan, audit, turn_id).await;
        }
        plan.response_text.clone()
    }

    async fn run_tool_calls(&self, plan: &Plan, audit: &AuditLog<'_>, turn_id: &str) -> Option<String> {
        let bridge = ExecutorAuditBridge::new(audit);
        let executor =
            jarvis_executor::Executor::new(&self.registry, &self.authority, &self.circuits, &self.health, &bridge);
        let mut budget = FailureBudget::default();
        let mut last_output: Option<String> = None;
        let dependencies: Vec<String> = Vec::new();

        for call in &plan.tool_calls {
            let Some(tool) = self.registry.get(&call.tool) else {
                continue;
            };
            let definition = tool.definition().clone();

            let (skip, reason) =
                self.degradation.should_skip(&call.tool, definition.permission_level, &budget, &dependencies);
            if skip {
                tracing::warn!(tool = %call.tool, reason = %reason, "skipping tool call");
                budget.record_skip(call.tool.clone());
                continue;
            }

            let result = executor.execute(&call.tool, call.arguments.clone(), turn_id, None).await;
            match result.status {
                jarvis_executor::ExecutionStatus::Success => {
                    budget.record_success();
                    last_output = result.output.map(|v| v.to_string());
                }
                jarvis_executor::ExecutionStatus::ConfirmationRequired => {
                    if let Some(pending) = &result.pending {
                        let _ = audit.log(
                            EventType::ConfirmRequest,
                            Actor::Authority,
                            "confirm_request",
                            turn_id.to_string(),
                            Some(call.tool.clone()),
                            Some(serde_json::json!({ "confirmation_id": pending.id })),
                        );
                    }
                    budget.record_failure(&call.tool);
                }
                _ => {
                    budget.record_failure(&call.tool);
                }
            }

            if budget.should_abort() {
                tracing::warn!(turn_id, "failure budget exhausted; aborting plan");
                break;
            }
        }

        last_output
    }

    fn finish_turn(
        &self,
        audit: &AuditLog<'_>,
        turn_id: String,
        response: Option<String>,
        error_message: Option<String>,
    ) -> Option<String> {
        let _ = audit.log(
            EventType::TurnEnd,
            Actor::System,
            "turn_end",
            turn_id,
            None,
            Some(serde_json::json!({ "had_response": response.is_some(), "error": error_message })),
        );
        let outcome = error_message.or(response);
        if let Err(BusError::ListenerPanicked(msg)) = self.on_result.emit(outcome.clone()) {
            tracing::warn!(error = msg, "on_result listener panicked");
        }
        outcome
    }
}
