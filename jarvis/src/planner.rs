//! The planner (LLM backend) as an external collaborator.
//!
//! [`jarvis_planner::PlannerGate`] validates whatever shape comes back;
//! this trait only owns getting a raw JSON value out of that backend.
//! Kept dyn-compatible with a manual future so callers can hold
//! `Arc<dyn PlannerClient>` the same way the scheduler holds
//! `Arc<dyn Dispatcher>`.

use std::future::Future;
use std::pin::Pin;

use jarvis_types::{ClassifyHint, JarvisError, classify};

/// One request to the planner: the user's (or scheduled action's) text,
/// plus whatever tool schemas it should be allowed to call.
pub struct PlannerRequest<'a> {
    /// The text to plan over.
    pub text: &'a str,
    /// Exported tool schemas, from [`jarvis_tool::ToolRegistry::export_schemas_for_planner`].
    pub tool_schemas: serde_json::Value,
    /// The active turn id, for the backend's own logging/tracing.
    pub turn_id: &'a str,
}

/// An external planner backend. Implementations own the actual LLM call;
/// this crate only needs a raw JSON value shaped like
/// [`jarvis_planner::PlannerOutput`] back.
pub trait PlannerClient: Send + Sync {
    /// Produce raw planner output for `request`. Network/backend failures
    /// are returned as a classified [`JarvisError`], never panicked.
    fn plan<'a>(
        &'a self,
        request: PlannerRequest<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, JarvisError>> + Send + 'a>>;
}

/// A [`PlannerClient`] that always responds with a direct text response
/// echoing the input, never calling any tool. Useful for tests and as a
/// placeholder before a real backend is wired in.
pub struct EchoPlanner;

impl PlannerClient for EchoPlanner {
    fn plan<'a>(
        &'a self,
        request: PlannerRequest<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, JarvisError>> + Send + 'a>> {
        let text = request.text.to_string();
        Box::pin(async move { Ok(serde_json::json!({ "response": text })) })
    }
}

/// A [`PlannerClient`] that always fails, classified as an LLM failure.
/// Useful for exercising the orchestrator's degraded-planner path.
pub struct UnavailablePlanner;

impl PlannerClient for UnavailablePlanner {
    fn plan<'a>(
        &'a self,
        _request: PlannerRequest<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, JarvisError>> + Send + 'a>> {
        Box::pin(async move {
            Err(classify(ClassifyHint::Network, "planner", "planner backend unreachable"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_planner_returns_a_direct_response() {
        let planner = EchoPlanner;
        let out = planner
            .plan(PlannerRequest { text: "hello", tool_schemas: serde_json::json!([]), turn_id: "turn_1" })
            .await
            .unwrap();
        assert_eq!(out["response"], "hello");
    }

    #[tokio::test]
    async fn unavailable_planner_reports_a_classified_network_error() {
        let planner = UnavailablePlanner;
        let err = planner
            .plan(PlannerRequest { text: "hello", tool_schemas: serde_json::json!([]), turn_id: "turn_1" })
            .await
            .unwrap_err();
        assert_eq!(err.category, jarvis_types::ErrorCategory::NetworkError);
    }
}
