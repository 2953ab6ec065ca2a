//! # layer0 — shared protocol primitives for the orchestration core
//!
//! This crate holds the small set of types every other `jarvis-*` crate
//! needs and none of them should own individually: typed identifiers,
//! a stable millisecond duration, and the hook mechanism used by the
//! executor's tool pipeline and the turn state machine's listeners.
//!
//! ## Design Principle
//!
//! Nothing in this crate is mechanism-specific. [`Hook`] means
//! "observe this point and optionally intervene" — not "call this
//! particular audit or security module." Concrete hooks (redaction,
//! confirmation gating) live in the crates that own that policy.
//!
//! ## Dependency Notes
//!
//! This crate depends on `serde_json::Value` for extension data fields
//! (tool inputs/outputs). JSON is the interchange format used at every
//! tool boundary in this workspace; a generic `T: Serialize` would
//! complicate trait object safety for no practical benefit.

#![deny(missing_docs)]

pub mod duration;
pub mod error;
pub mod hook;
pub mod id;

pub use duration::DurationMs;
pub use error::HookError;
pub use hook::{Hook, HookAction, HookContext, HookPoint};
pub use id::{ScopeId, SessionId, TurnId};
