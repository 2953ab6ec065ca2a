//! Turn lifecycle State Machine.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of transitions retained in the in-memory history ring.
const HISTORY_CAPACITY: usize = 256;

/// Valid states for the turn lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TurnState {
    /// Waiting for user input.
    Idle,
    /// Capturing audio (external collaborator owns the capture itself).
    Listening,
    /// Converting speech to text (external collaborator).
    Transcribing,
    /// The planner gate is producing/validating a plan.
    Planning,
    /// The executor is running tool calls.
    Executing,
    /// Formatting and returning the result.
    Responding,
    /// An unrecoverable-within-turn fault occurred.
    Error,
}

impl TurnState {
    /// The fixed adjacency list for this state.
    fn valid_targets(self) -> &'static [TurnState] {
        use TurnState::*;
        match self {
            Idle => &[Listening, Planning, Error],
            Listening => &[Idle, Transcribing, Error],
            Transcribing => &[Planning, Idle, Error],
            Planning => &[Executing, Responding, Idle, Error],
            Executing => &[Responding, Error],
            Responding => &[Idle, Listening, Error],
            Error => &[Idle],
        }
    }
}

/// Errors raised by state machine operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StateError {
    /// The requested transition is not adjacent to the current state.
    /// Never recoverable within the same turn.
    #[error("invalid transition: {from:?} -> {to:?} (valid targets: {valid:?})")]
    InvalidTransition {
        /// The state the machine was in.
        from: TurnState,
        /// The state that was requested.
        to: TurnState,
        /// The states that were actually reachable.
        valid: Vec<TurnState>,
    },
}

/// A single recorded transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    /// The state transitioned from.
    pub from_state: TurnState,
    /// The state transitioned to.
    pub to_state: TurnState,
    /// When the transition occurred.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Human-readable reason for the transition.
    pub reason: String,
}

/// A listener invoked synchronously after every successful transition.
/// A listener that panics does not abort the transition — the panic is
/// caught and logged instead.
pub type Listener = Box<dyn Fn(&StateTransition) + Send + Sync>;

struct Inner {
    state: TurnState,
    history: VecDeque<StateTransition>,
    listeners: Vec<Listener>,
}

/// The turn lifecycle state machine.
///
/// Thread-safe: all reads/mutations go through an internal mutex, matching
/// the "mutually exclusive with respect to transitions" requirement this
/// core places on the circuit breaker and audit log as well.
pub struct StateMachine {
    inner: Mutex<Inner>,
}

impl StateMachine {
    /// Construct a state machine starting in `IDLE`.
    pub fn new() -> Self {
        tracing::info!(state = ?TurnState::Idle, "state machine initialized");
        Self {
            inner: Mutex::new(Inner {
                state: TurnState::Idle,
                history: VecDeque::with_capacity(HISTORY_CAPACITY),
                listeners: Vec::new(),
            }),
        }
    }

    /// The current state.
    pub fn current(&self) -> TurnState {
        self.inner.lock().expect("state machine mutex poisoned").state
    }

    /// Whether a transition to `to` is valid from the current state.
    pub fn can_transition(&self, to: TurnState) -> bool {
        let state = self.current();
        state.valid_targets().contains(&to)
    }

    /// A snapshot of the transition history, oldest first.
    pub fn history(&self) -> Vec<StateTransition> {
        self.inner
            .lock()
            .expect("state machine mutex poisoned")
            .history
            .iter()
            .cloned()
            .collect()
    }

    /// Register a listener notified synchronously on every successful
    /// transition, in transition order.
    pub fn add_listener(&self, listener: Listener) {
        self.inner
            .lock()
            .expect("state machine mutex poisoned")
            .listeners
            .push(listener);
    }

    /// Attempt a transition, appending to history and notifying listeners
    /// on success.
    pub fn transition(&self, to: TurnState, reason: impl Into<String>) -> Result<StateTransition, StateError> {
        let reason = reason.into();
        let mut guard = self.inner.lock().expect("state machine mutex poisoned");
        let from = guard.state;

        if !from.valid_targets().contains(&to) {
            return Err(StateError::InvalidTransition {
                from,
                to,
                valid: from.valid_targets().to_vec(),
            });
        }

        let record = StateTransition {
            from_state: from,
            to_state: to,
            timestamp: chrono::Utc::now(),
            reason,
        };

        guard.state = to;
        if guard.history.len() == HISTORY_CAPACITY {
            guard.history.pop_front();
        }
        guard.history.push_back(record.clone());

        tracing::info!(from = ?from, to = ?to, reason = %record.reason, "state transition");

        for listener in &guard.listeners {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| listener(&record)));
            if result.is_err() {
                tracing::warn!("state machine listener panicked; ignoring");
            }
        }

        Ok(record)
    }

    /// Force the machine back to `IDLE`. If not already in `IDLE`, a
    /// synthesized `ERROR -> IDLE` transition is appended (first inserting
    /// an out-of-band `-> ERROR` step when the current state isn't already
    /// `ERROR`).
    pub fn reset(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let current = self.current();
        if current == TurnState::Idle {
            return;
        }

        if current != TurnState::Error {
            let mut guard = self.inner.lock().expect("state machine mutex poisoned");
            let record = StateTransition {
                from_state: current,
                to_state: TurnState::Error,
                timestamp: chrono::Utc::now(),
                reason: format!("reset initiated: {reason}"),
            };
            guard.state = TurnState::Error;
            if guard.history.len() == HISTORY_CAPACITY {
                guard.history.pop_front();
            }
            guard.history.push_back(record);
        }

        let _ = self.transition(TurnState::Idle, reason);
    }

    /// Whether the machine is in a state other than `IDLE`/`ERROR`.
    pub fn is_busy(&self) -> bool {
        !matches!(self.current(), TurnState::Idle | TurnState::Error)
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn happy_path_sequence_succeeds() {
        let sm = StateMachine::new();
        sm.transition(TurnState::Planning, "text input").unwrap();
        sm.transition(TurnState::Executing, "plan valid").unwrap();
        sm.transition(TurnState::Responding, "tools ran").unwrap();
        sm.transition(TurnState::Idle, "response delivered").unwrap();
        assert_eq!(sm.current(), TurnState::Idle);
        assert_eq!(sm.history().len(), 4);
    }

    #[test]
    fn non_adjacent_transition_is_rejected() {
        let sm = StateMachine::new();
        let err = sm.transition(TurnState::Executing, "should fail").unwrap_err();
        assert!(matches!(err, StateError::InvalidTransition { .. }));
        assert_eq!(sm.current(), TurnState::Idle);
    }

    #[test]
    fn error_recovers_only_to_idle() {
        let sm = StateMachine::new();
        sm.transition(TurnState::Planning, "go").unwrap();
        sm.transition(TurnState::Error, "boom").unwrap();
        assert!(sm.transition(TurnState::Planning, "nope").is_err());
        assert!(sm.transition(TurnState::Idle, "recover").is_ok());
    }

    #[test]
    fn reset_from_non_idle_synthesizes_error_then_idle() {
        let sm = StateMachine::new();
        sm.transition(TurnState::Planning, "go").unwrap();
        sm.reset("manual reset");
        assert_eq!(sm.current(), TurnState::Idle);
        let history = sm.history();
        assert_eq!(history[history.len() - 2].to_state, TurnState::Error);
        assert_eq!(history[history.len() - 1].to_state, TurnState::Idle);
    }

    #[test]
    fn reset_from_idle_is_a_no_op() {
        let sm = StateMachine::new();
        sm.reset("noop");
        assert_eq!(sm.current(), TurnState::Idle);
        assert!(sm.history().is_empty());
    }

    #[test]
    fn listener_is_notified_in_transition_order() {
        let sm = StateMachine::new();
        let seen: Arc<Mutex<Vec<TurnState>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        sm.add_listener(Box::new(move |t| {
            seen_clone.lock().unwrap().push(t.to_state);
        }));
        sm.transition(TurnState::Planning, "a").unwrap();
        sm.transition(TurnState::Executing, "b").unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![TurnState::Planning, TurnState::Executing]
        );
    }

    #[test]
    fn panicking_listener_does_not_abort_transition() {
        let sm = StateMachine::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        sm.add_listener(Box::new(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            panic!("listener blew up");
        }));
        let result = sm.transition(TurnState::Planning, "go");
        assert!(result.is_ok());
        assert_eq!(sm.current(), TurnState::Planning);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn is_busy_reflects_non_idle_non_error_states() {
        let sm = StateMachine::new();
        assert!(!sm.is_busy());
        sm.transition(TurnState::Planning, "go").unwrap();
        assert!(sm.is_busy());
        sm.transition(TurnState::Error, "boom").unwrap();
        assert!(!sm.is_busy());
    }
}
