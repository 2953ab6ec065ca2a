//! User preference storage.
//!
//! Key-value store for things like default browser, preferred voice,
//! timezone, volume level. Updates are explicit only — there is no
//! auto-learning or inference path that writes to this store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Failures from loading or saving the preference file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PreferenceError {
    /// The file could not be read or written.
    #[error("preference file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// The file's contents could not be parsed as YAML.
    #[error("preference file is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn default_preferences() -> HashMap<String, Value> {
    [
        ("language", Value::from("en")),
        ("timezone", Value::from("local")),
        ("default_browser", Value::from("default")),
        ("volume_default", Value::from(50)),
        ("confidence_threshold", Value::from(0.6)),
        ("max_results", Value::from(5)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPreferences {
    #[serde(default)]
    preferences: HashMap<String, Value>,
    #[serde(default = "Utc::now")]
    updated_at: DateTime<Utc>,
}

/// Persistent, explicit-update-only preference storage.
///
/// Preferences are loaded from `store_path` at construction and written
/// back to disk on every mutating call. A fixed set of defaults fills in
/// any key the file doesn't set.
pub struct PreferenceStore {
    path: PathBuf,
    preferences: HashMap<String, Value>,
    updated_at: DateTime<Utc>,
}

impl PreferenceStore {
    /// Open (or initialize) the preference store at `store_path`.
    pub fn open(store_path: impl AsRef<Path>) -> Result<Self, PreferenceError> {
        let path = store_path.as_ref().to_path_buf();
        let mut store = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let stored: StoredPreferences = serde_yaml::from_str(&raw)?;
            Self {
                path,
                preferences: stored.preferences,
                updated_at: stored.updated_at,
            }
        } else {
            Self {
                path,
                preferences: HashMap::new(),
                updated_at: Utc::now(),
            }
        };

        for (key, value) in default_preferences() {
            store.preferences.entry(key).or_insert(value);
        }

        Ok(store)
    }

    fn save(&self) -> Result<(), PreferenceError> {
        let stored = StoredPreferences {
            preferences: self.preferences.clone(),
            updated_at: self.updated_at,
        };
        let raw = serde_yaml::to_string(&stored)?;
        std::fs::write(&self.path, raw)?;
        tracing::debug!(path = %self.path.display(), "preferences saved");
        Ok(())
    }

    /// Get a preference, falling back to the built-in default if unset.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.preferences.get(key)
    }

    /// Set a preference. This is the only mutation path — there is no
    /// inference or auto-learning that writes here.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Result<(), PreferenceError> {
        let key = key.into();
        self.preferences.insert(key.clone(), value.clone());
        self.updated_at = Utc::now();
        tracing::info!(key, ?value, "preference updated");
        self.save()
    }

    /// Remove a preference entirely. Returns whether it existed.
    pub fn remove(&mut self, key: &str) -> Result<bool, PreferenceError> {
        let existed = self.preferences.remove(key).is_some();
        if existed {
            self.updated_at = Utc::now();
            self.save()?;
        }
        Ok(existed)
    }

    /// Reset one preference to its built-in default, or remove it if it
    /// has none.
    pub fn reset(&mut self, key: &str) -> Result<(), PreferenceError> {
        match default_preferences().remove(key) {
            Some(default) => self.set(key, default),
            None => self.remove(key).map(|_| ()),
        }
    }

    /// Reset every preference to the built-in defaults.
    pub fn reset_all(&mut self) -> Result<(), PreferenceError> {
        self.preferences = default_preferences();
        self.updated_at = Utc::now();
        tracing::info!("all preferences reset to defaults");
        self.save()
    }

    /// All currently set preferences, including defaults.
    pub fn list_all(&self) -> &HashMap<String, Value> {
        &self.preferences
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_present_on_a_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::open(dir.path().join("prefs.yaml")).unwrap();
        assert_eq!(store.get("language").unwrap(), "en");
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PreferenceStore::open(dir.path().join("prefs.yaml")).unwrap();
        store.set("custom_key", Value::from("custom_value")).unwrap();
        assert_eq!(store.get("custom_key").unwrap(), "custom_value");
    }

    #[test]
    fn preferences_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.yaml");
        let mut store = PreferenceStore::open(&path).unwrap();
        store.set("custom_key", Value::from("custom_value")).unwrap();

        let reopened = PreferenceStore::open(&path).unwrap();
        assert_eq!(reopened.get("custom_key").unwrap(), "custom_value");
    }

    #[test]
    fn remove_deletes_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PreferenceStore::open(dir.path().join("prefs.yaml")).unwrap();
        store.set("custom_key", Value::from("custom_value")).unwrap();
        assert!(store.remove("custom_key").unwrap());
        assert!(store.get("custom_key").is_none());
    }

    #[test]
    fn reset_restores_the_built_in_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PreferenceStore::open(dir.path().join("prefs.yaml")).unwrap();
        store.set("language", Value::from("fr")).unwrap();
        store.reset("language").unwrap();
        assert_eq!(store.get("language").unwrap(), "en");
    }
}
