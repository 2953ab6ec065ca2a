//! `JARVIS_<SECTION>_<KEY>` environment overrides, applied as a recursive
//! merge over [`serde_json::Value`] before the document is deserialized
//! into its typed shape.

use serde_json::Value;

const PREFIX: &str = "JARVIS_";

/// Collect every `JARVIS_<SECTION>_<KEY>` environment variable into
/// `(section, key, value)` triples. `section` and `key` are lowercased;
/// `value` is parsed as JSON when possible (so `"true"`, `"5"`, `"[1,2]"`
/// take their native type) and falls back to a JSON string otherwise.
fn collect_overrides(vars: impl IntoIterator<Item = (String, String)>) -> Vec<(String, String, Value)> {
    let mut overrides = Vec::new();
    for (name, raw) in vars {
        let Some(rest) = name.strip_prefix(PREFIX) else { continue };
        let Some((section, key)) = rest.split_once('_') else { continue };
        let value = serde_json::from_str(&raw).unwrap_or_else(|_| Value::String(raw.clone()));
        overrides.push((section.to_lowercase(), key.to_lowercase(), value));
    }
    overrides
}

/// Apply every `JARVIS_<SECTION>_<KEY>` variable in the process
/// environment onto `doc`, overwriting `doc[section][key]` for each one.
/// Sections absent from `doc` are created as empty objects first.
pub fn apply_env_overrides(doc: &mut Value) {
    apply_overrides(doc, collect_overrides(std::env::vars()));
}

fn apply_overrides(doc: &mut Value, overrides: Vec<(String, String, Value)>) {
    if overrides.is_empty() {
        return;
    }
    if !doc.is_object() {
        *doc = Value::Object(Default::default());
    }
    let root = doc.as_object_mut().expect("just normalized to an object");
    for (section, key, value) in overrides {
        let entry = root.entry(section.clone()).or_insert_with(|| Value::Object(Default::default()));
        if !entry.is_object() {
            tracing::warn!(section, key, "env override skipped: section is not an object in the base document");
            continue;
        }
        tracing::info!(section, key, "env override applied");
        entry.as_object_mut().expect("checked above").insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_values_without_json_meaning_stay_strings() {
        let overrides = collect_overrides([("JARVIS_STT_MODEL".to_string(), "large-v3".to_string())]);
        assert_eq!(overrides, vec![("stt".to_string(), "model".to_string(), Value::String("large-v3".to_string()))]);
    }

    #[test]
    fn numeric_values_are_parsed_as_json() {
        let overrides = collect_overrides([("JARVIS_STT_BEAM_SIZE".to_string(), "8".to_string())]);
        assert_eq!(overrides[0].2, Value::from(8));
    }

    #[test]
    fn unrelated_vars_are_ignored() {
        let overrides = collect_overrides([("PATH".to_string(), "/usr/bin".to_string())]);
        assert!(overrides.is_empty());
    }

    #[test]
    fn override_replaces_the_key_in_an_existing_section() {
        let mut doc = serde_json::json!({"stt": {"model": "base", "beam_size": 5}});
        apply_overrides(&mut doc, vec![("stt".to_string(), "beam_size".to_string(), Value::from(8))]);
        assert_eq!(doc["stt"]["beam_size"], Value::from(8));
        assert_eq!(doc["stt"]["model"], Value::from("base"));
    }

    #[test]
    fn override_creates_a_missing_section() {
        let mut doc = serde_json::json!({});
        apply_overrides(&mut doc, vec![("audio".to_string(), "channels".to_string(), Value::from(2))]);
        assert_eq!(doc["audio"]["channels"], Value::from(2));
    }
}
