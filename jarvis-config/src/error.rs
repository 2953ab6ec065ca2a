//! Errors from loading the configuration document.

use thiserror::Error;

/// Failures from reading or parsing a configuration document.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("config file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// The file's contents could not be parsed as YAML.
    #[error("config is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// An env-var override, or the merged document, did not deserialize
    /// into the expected shape.
    #[error("config did not match the expected shape: {0}")]
    Shape(#[from] serde_json::Error),
    /// An env-var override's dotted path could not be applied (e.g. it
    /// tried to index through a scalar).
    #[error("env override {path} could not be applied: {reason}")]
    BadOverride {
        /// The dotted path derived from the env var name.
        path: String,
        /// Why the override could not be applied.
        reason: String,
    },
}
