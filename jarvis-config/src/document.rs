//! Typed shape of the configuration document").

use std::path::PathBuf;

use jarvis_types::PermissionLevel;
use serde::{Deserialize, Serialize};

/// `audio.*` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count (1 = mono, 2 = stereo).
    pub channels: u8,
    /// PCM sample format, e.g. `"int16"`.
    pub dtype: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { sample_rate: 16_000, channels: 1, dtype: "int16".to_string() }
    }
}

/// `stt.*` section (speech-to-text engine options).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SttConfig {
    /// Model identifier.
    pub model: String,
    /// BCP-47 language tag.
    pub language: String,
    /// Beam search width.
    pub beam_size: u32,
    /// Minimum confidence below which a transcript is treated as uncertain.
    pub confidence_threshold: f64,
    /// Inference device, e.g. `"cpu"` or `"cuda"`.
    pub device: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "base".to_string(),
            language: "en".to_string(),
            beam_size: 5,
            confidence_threshold: 0.6,
            device: "cpu".to_string(),
        }
    }
}

/// `commands.*` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Path to the tool/command registry definition file.
    pub registry_path: PathBuf,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self { registry_path: PathBuf::from("commands.yaml") }
    }
}

/// `security.default_policy`: whether an un-enumerated target is denied
/// or allowed by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultPolicy {
    /// Deny anything not explicitly granted.
    Deny,
    /// Allow anything not explicitly blocked.
    Allow,
}

/// `security.*` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Fallback policy for targets with no explicit grant.
    pub default_policy: DefaultPolicy,
    /// Filesystem paths the sandbox must never touch, regardless of grants.
    #[serde(default)]
    pub blocked_paths: Vec<PathBuf>,
    /// Application names allowed to be launched by EXECUTE-level tools.
    #[serde(default)]
    pub allowed_apps: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self { default_policy: DefaultPolicy::Deny, blocked_paths: Vec::new(), allowed_apps: Vec::new() }
    }
}

/// The full configuration document: `audio`, `stt`, `commands`, `security`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// `audio.*`.
    #[serde(default)]
    pub audio: AudioConfig,
    /// `stt.*`.
    #[serde(default)]
    pub stt: SttConfig,
    /// `commands.*`.
    #[serde(default)]
    pub commands: CommandsConfig,
    /// `security.*`.
    #[serde(default)]
    pub security: SecurityConfig,
}

/// One entry of `permission.default_grants`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultGrantSpec {
    /// Tool name or permission-level name the grant applies to.
    pub target: String,
    /// The level granted.
    pub level: PermissionLevel,
}

/// The permission-config document: default grants seeded at startup, plus
/// the levels that always require confirmation or are always blocked
/// regardless of any grant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionConfig {
    /// Grants seeded at startup.
    #[serde(default)]
    pub default_grants: Vec<DefaultGrantSpec>,
    /// Levels that require confirmation even when granted.
    #[serde(default)]
    pub requires_confirmation: Vec<PermissionLevel>,
    /// Levels no grant can ever authorize.
    #[serde(default)]
    pub always_blocked: Vec<PermissionLevel>,
}
