//! Loading [`Config`] and [`PermissionConfig`] from YAML, with env overrides.

use std::path::Path;

use crate::document::{Config, PermissionConfig};
use crate::env_override::apply_env_overrides;
use crate::error::ConfigError;

/// Load the main configuration document from `path`, then apply any
/// `JARVIS_<SECTION>_<KEY>` environment overrides on top.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    parse_config(&raw)
}

/// As [`load_config`], but starting from an already-read string — useful
/// for callers who source the document from somewhere other than a file.
pub fn parse_config(raw: &str) -> Result<Config, ConfigError> {
    let mut doc: serde_json::Value = serde_yaml::from_str(raw)?;
    apply_env_overrides(&mut doc);
    Ok(serde_json::from_value(doc)?)
}

/// Load the permission-config document from `path`. Unlike [`load_config`],
/// this document has no env-var override rule defined, so it is
/// deserialized as-is.
pub fn load_permission_config(path: impl AsRef<Path>) -> Result<PermissionConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&raw)?)
}
