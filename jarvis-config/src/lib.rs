#![deny(missing_docs)]
//! Configuration document loading").
//!
//! Deserializes the structured YAML configuration document into typed
//! sections (`audio`, `stt`, `commands`, `security`) and the separate
//! permission-config document (`default_grants`, `requires_confirmation`,
//! `always_blocked`). `JARVIS_<SECTION>_<KEY>` environment variables
//! override individual keys in the main document after it is parsed and
//! before it is deserialized into [`Config`].
//!
//! The loader itself is deliberately thin: spec.md names YAML/dotfile
//! configuration loaders as an out-of-scope front-end collaborator. This
//! crate exists so the Core has a typed struct to deserialize into, not
//! to own file discovery, hot-reload, or CLI flag parsing.

mod document;
mod env_override;
mod error;
mod loader;

pub use document::{
    AudioConfig, CommandsConfig, Config, DefaultGrantSpec, DefaultPolicy, PermissionConfig, SecurityConfig, SttConfig,
};
pub use error::ConfigError;
pub use loader::{load_config, load_permission_config, parse_config};
