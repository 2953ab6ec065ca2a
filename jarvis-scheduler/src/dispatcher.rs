//! Where a due task's action text goes.

use std::future::Future;
use std::pin::Pin;

/// Re-enters the orchestrator's turn pipeline with a scheduled task's
/// `action_text`, as if it had been typed by the user. Implemented by
/// the orchestrator rather than depended on directly, so this crate
/// doesn't need to know about turns, planning, or authority.
pub trait Dispatcher: Send + Sync {
    /// Dispatch `action_text` under a freshly minted `turn_id`, returning
    /// the orchestrator's response text if any.
    fn dispatch<'a>(
        &'a self,
        action_text: &'a str,
        turn_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;
}

/// A [`Dispatcher`] that does nothing; useful for tests.
pub struct NoopDispatcher;

impl Dispatcher for NoopDispatcher {
    fn dispatch<'a>(
        &'a self,
        _action_text: &'a str,
        _turn_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async { None })
    }
}
