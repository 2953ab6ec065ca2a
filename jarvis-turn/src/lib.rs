#![deny(missing_docs)]
//! # jarvis-turn — turn context and lifecycle state machine
//!
//! Two related but independent mechanisms:
//!
//! - [`TurnContext`]: mints and propagates the task-local `turn_id`
//! so every downstream layer can read it without threading it
//!   through every call signature.
//! - [`StateMachine`]: validates and records transitions through the
//!   turn lifecycle, independent of which `turn_id` is active.
//!
//! The executor and orchestrator compose these two with the rest of the
//! pipeline; neither type here knows about tools, authority, or audit.

pub mod context;
pub mod state_machine;

pub use context::TurnContext;
pub use state_machine::{Listener, StateError, StateMachine, StateTransition, TurnState};
