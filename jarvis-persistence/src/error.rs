//! Persistence error taxonomy.

use thiserror::Error;

/// Failures from opening, migrating, or querying the embedded database.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistenceError {
    /// The underlying SQLite driver returned an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The on-disk schema is newer than this build understands.
    /// Downgrading is never attempted.
    #[error(
        "database schema version ({db_version}) is newer than this build ({code_version}); \
         downgrade is not supported"
    )]
    SchemaMismatch {
        /// Version recorded in the database.
        db_version: i64,
        /// Version this build expects.
        code_version: i64,
    },

    /// A forward migration step failed partway through.
    #[error("migration to schema v{version} failed: {reason}")]
    MigrationFailed {
        /// The version the failed migration was moving to.
        version: i64,
        /// Underlying cause.
        reason: String,
    },

    /// `PRAGMA integrity_check` returned something other than `"ok"`.
    #[error("database integrity check failed: {0}")]
    IntegrityCheckFailed(String),

    /// A legacy JSON task file was found where only the `tasks` table is
    /// allowed. Refused rather than silently imported.
    #[error("legacy JSON task file found at {0}; JSON task persistence is no longer supported")]
    LegacyTaskFile(std::path::PathBuf),
}
