#![deny(missing_docs)]
//! # jarvis — orchestrator and front-end contract
//!
//! The top-level crate. It exposes the front-end contract
//! (`process_text_directly`, `start_listening`, `stop_listening`,
//! `get_status`, `shutdown`, and the `on_transcription`/`on_command`/
//! `on_result` callbacks) and owns the orchestrator that sequences a
//! turn end-to-end across every other crate in this workspace: the tool
//! catalog, authority and confirmation workflow, circuit breakers,
//! graceful degradation, the executor, the HMAC-chained audit log,
//! memory governance, persistence, and the scheduler.
//!
//! Every other crate here is a collaborator with a narrow, object-safe
//! boundary (`AuditSink`, `Dispatcher`, `PlannerClient`); this crate is
//! where those boundaries get wired together and where the turn state
//! machine actually advances.

mod audit_bridge;
mod bus;
mod orchestrator;
mod planner;

pub use bus::{BusError, EventSlot, LISTENER_GRACE};
pub use jarvis_audit::AuditBundle;
pub use jarvis_persistence::Database;
pub use jarvis_tool::ToolRegistry;
pub use orchestrator::Jarvis;
pub use planner::{EchoPlanner, PlannerClient, PlannerRequest, UnavailablePlanner};

#[cfg(test)]
mod tests {
    use super::*;
    use jarvis_config::PermissionConfig;
    use std::sync::Arc;

    fn build() -> Jarvis {
        let registry = ToolRegistry::new();
        let db = Database::open_in_memory().unwrap();
        Jarvis::new(registry, PermissionConfig::default(), db, Arc::new(EchoPlanner))
    }

    #[tokio::test]
    async fn process_text_directly_returns_the_planners_response() {
        let jarvis = build();
        let response = jarvis.process_text_directly("turn the lights on").await;
        assert_eq!(response, Some("turn the lights on".to_string()));
    }

    #[tokio::test]
    async fn status_reports_idle_after_a_turn_completes() {
        let jarvis = build();
        jarvis.process_text_directly("hello").await;
        let status = jarvis.get_status();
        assert_eq!(status["state"], "Idle");
        assert_eq!(status["busy"], false);
    }

    #[tokio::test]
    async fn on_result_callback_observes_the_turns_response() {
        let jarvis = build();
        let seen = Arc::new(std::sync::Mutex::new(None));
        let seen_clone = seen.clone();
        jarvis.on_result(move |result| {
            *seen_clone.lock().unwrap() = Some(result);
        });
        jarvis.process_text_directly("hello").await;
        assert!(seen.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn planner_failure_surfaces_a_fixed_user_facing_message() {
        let registry = ToolRegistry::new();
        let db = Database::open_in_memory().unwrap();
        let jarvis = Jarvis::new(registry, PermissionConfig::default(), db, Arc::new(crate::planner::UnavailablePlanner));
        let response = jarvis.process_text_directly("hello").await;
        assert_eq!(response, Some("I couldn't reach the network.".to_string()));
    }

    #[test]
    fn forget_all_reports_zero_items_with_no_memory_backed_yet() {
        let jarvis = build();
        let result = jarvis.forget_all();
        assert_eq!(result["items_deleted"], 0);
    }

    #[test]
    fn memory_summary_reports_the_default_policy() {
        let jarvis = build();
        let summary = jarvis.memory_summary();
        assert_eq!(summary["policy"]["max_turns"], 1000);
    }

    #[tokio::test]
    async fn export_audit_bundle_covers_a_completed_turns_entries() {
        let jarvis = build();
        jarvis.process_text_directly("hello").await;
        let bundle = jarvis.export_audit_bundle(1, None);
        assert_eq!(bundle.entry_count, 3);
        assert_eq!(bundle.first_entry_id, Some(1));
    }
}
