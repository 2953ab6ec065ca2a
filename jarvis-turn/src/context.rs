//! Turn context: a task-local `turn_id` accessible by any layer without
//! threading it through every call signature.

use layer0::TurnId;
use std::future::Future;

tokio::task_local! {
    static CURRENT_TURN: TurnId;
}

/// Entry point for turn-scoped execution.
///
/// Contract: entering a turn scope sets the id for the duration of the
/// future; exiting restores the prior value (there is none to restore to
/// at the top level — nested scopes, if ever introduced, would restore
/// the enclosing scope's id). Concurrent turns each run in their own
/// task and never observe each other's id, since `tokio::task_local!`
/// storage is per-task.
pub struct TurnContext;

impl TurnContext {
    /// Generate an opaque unique turn id with at least 96 bits of entropy.
    pub fn generate_id() -> TurnId {
        let bytes: [u8; 16] = rand::random();
        TurnId::new(format!("turn_{}", hex::encode(bytes)))
    }

    /// Run `fut` with `id` set as the current turn for its whole duration.
    pub async fn enter<F, T>(id: TurnId, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        CURRENT_TURN.scope(id, fut).await
    }

    /// The current turn id, if called from within [`TurnContext::enter`].
    pub fn try_current() -> Option<TurnId> {
        CURRENT_TURN.try_with(|id| id.clone()).ok()
    }

    /// The current turn id as a string, or the literal `"-"` if absent.
    pub fn current_or_dash() -> String {
        Self::try_current()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generated_ids_are_unique() {
        let a = TurnContext::generate_id();
        let b = TurnContext::generate_id();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn current_is_dash_outside_a_turn() {
        assert_eq!(TurnContext::current_or_dash(), "-");
    }

    #[tokio::test]
    async fn current_is_set_inside_a_turn() {
        let id = TurnContext::generate_id();
        let expected = id.to_string();
        let observed = TurnContext::enter(id, async { TurnContext::current_or_dash() }).await;
        assert_eq!(observed, expected);
    }

    #[tokio::test]
    async fn concurrent_turns_do_not_see_each_others_id() {
        let a = TurnContext::generate_id();
        let b = TurnContext::generate_id();
        let (a_str, b_str) = (a.to_string(), b.to_string());

        let handle_a = tokio::spawn(TurnContext::enter(a, async {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            TurnContext::current_or_dash()
        }));
        let handle_b = tokio::spawn(TurnContext::enter(b, async {
            TurnContext::current_or_dash()
        }));

        let (observed_a, observed_b) = tokio::join!(handle_a, handle_b);
        assert_eq!(observed_a.unwrap(), a_str);
        assert_eq!(observed_b.unwrap(), b_str);
    }
}
