#![deny(missing_docs)]
//! Memory governance for the orchestration core.
//!
//! Three concerns, kept in separate modules so each can be reasoned about
//! (and tested) on its own: [`policy`] sets the limits, [`redaction`] and
//! [`retention`] enforce them, [`governor`] ties both to the
//! user-triggered deletion commands and an audit sink, and [`preferences`]
//! is the unrelated but adjacent explicit-only user-preference store.

mod governor;
mod policy;
mod preferences;
mod redaction;
mod retention;

pub use governor::{AuditSink, MemoryEventEntry, MemoryGovernor, NoopAuditSink};
pub use policy::MemoryPolicy;
pub use preferences::{PreferenceError, PreferenceStore};
pub use redaction::{redact, RedactionResult};
pub use retention::{enforce_retention, DeletionResult, Retainable};
