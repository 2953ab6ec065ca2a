//! Detection of the legacy JSON task file format. Task storage now lives
//! exclusively in the `tasks` table; a leftover JSON file from an older
//! build is never read, only reported.

use std::path::Path;

use crate::error::PersistenceError;

/// Check for a legacy JSON task file at `path`. If present, logs a
/// warning and returns [`PersistenceError::LegacyTaskFile`] rather than
/// reading it. Callers should surface this to the operator and continue
/// with an empty task list rather than treat it as fatal.
pub fn check_legacy_task_file(path: impl AsRef<Path>) -> Result<(), PersistenceError> {
    let path = path.as_ref();
    if path.exists() {
        tracing::warn!(path = %path.display(), "legacy JSON task file found, refusing to load it");
        return Err(PersistenceError::LegacyTaskFile(path.to_path_buf()));
    }
    Ok(())
}
