#![deny(missing_docs)]
//! The tool executor: the single entry point for every tool effect,
//! plus the sandbox rules and rate limiting it enforces around that
//! entry point.

pub mod executor;
pub mod rate_limit;
pub mod sandbox;

pub use executor::{
    ApproveFn, AuditSink, AuthorityCheckEntry, ConfirmResponseEntry, Executor, ExecutionResult, ExecutionStatus,
    GrantCreatedEntry, GrantRevokedEntry, NoopAuditSink, ToolExecuteEntry,
};
pub use rate_limit::{RateLimitConfig, TokenBucket};
pub use sandbox::{SandboxError, SandboxPolicy};
