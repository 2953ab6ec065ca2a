#![deny(missing_docs)]
//! Embedded database: schema versioning, startup-only retention pruning,
//! and storage for conversations, turns, memories, scheduled tasks, and
//! the audit log.
//!
//! [`Database`] implements [`jarvis_audit::AuditStore`] directly, so the
//! audit log can be wired straight to the same SQLite file as everything
//! else without `jarvis-audit` ever depending on this crate.

mod audit_store;
mod db;
mod error;
mod legacy;
mod models;
mod schema;

pub use db::Database;
pub use error::PersistenceError;
pub use legacy::check_legacy_task_file;
pub use models::{Conversation, Memory, TaskRow, TaskStatus, Turn};
pub use schema::{MAX_CONVERSATIONS, MAX_TURNS_PER_CONVERSATION, SCHEMA_VERSION};
