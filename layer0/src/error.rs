//! Error types shared by the hook mechanism.

use thiserror::Error;

/// Hook errors. These are logged but do NOT halt the turn on their own
/// (use `HookAction::Halt` to halt).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook execution failed.
    #[error("hook failed: {0}")]
    Failed(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
