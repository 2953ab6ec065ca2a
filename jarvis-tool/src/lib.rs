#![deny(missing_docs)]
//! # jarvis-tool — tool catalog and object-safe execution trait
//!
//! Mirrors the object-safe dispatch shape used for heterogeneous tool
//! sources in this workspace's wider tool crates: each tool implements
//! [`ToolDyn`] and is stored as `Arc<dyn ToolDyn>` in [`ToolRegistry`].
//! The registry is read-mostly after startup registration — it is the
//! boundary between planner output and system effects: a
//! successful [`ToolRegistry::validate_call`] is a precondition for every
//! execution path in the executor.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use jarvis_types::{ParamType, PermissionLevel, ToolDefinition};
use thiserror::Error;

/// Errors from tool catalog and invocation operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool was not found in the registry.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Arguments failed closed-world schema validation.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// Tool execution failed internally.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Object-safe trait for tool implementations.
///
/// Any tool source (local function, subprocess, HTTP endpoint) implements
/// this trait. Tools are stored as `Arc<dyn ToolDyn>` in [`ToolRegistry`].
pub trait ToolDyn: Send + Sync {
    /// The tool's catalog entry: name, schema, permission level, timeout.
    fn definition(&self) -> &ToolDefinition;

    /// Execute the tool with validated input. Callers MUST have already
    /// run the input through [`ToolRegistry::validate_call`] — this trait
    /// does not re-validate.
    fn call(
        &self,
        input: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>>;
}

/// Read-mostly catalog of tools, keyed by name.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolDyn>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Overwrites any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn ToolDyn>) {
        self.tools.insert(tool.definition().name.clone(), tool);
    }

    /// Remove a tool from the catalog by name.
    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn ToolDyn>> {
        self.tools.remove(name)
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolDyn>> {
        self.tools.get(name)
    }

    /// List every registered tool's definition.
    pub fn list(&self) -> Vec<&ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// List tool definitions at a given permission level.
    pub fn list_by_permission(&self, level: PermissionLevel) -> Vec<&ToolDefinition> {
        self.tools
            .values()
            .map(|t| t.definition())
            .filter(|d| d.permission_level == level)
            .collect()
    }

    /// List tool definitions in a given category.
    pub fn list_by_category(&self, category: &str) -> Vec<&ToolDefinition> {
        self.tools
            .values()
            .map(|t| t.definition())
            .filter(|d| d.category == category)
            .collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate a call's arguments against the tool's schema without
    /// executing it. Enforces: the tool exists; every required
    /// parameter is present; no unknown parameter names (closed-world);
    /// each value matches its declared type; enum membership; numeric
    /// range; regex for strings.
    pub fn validate_call(&self, name: &str, args: &serde_json::Value) -> Result<(), ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        let schema = &tool.definition().parameter_schema;

        let obj = args
            .as_object()
            .ok_or_else(|| ToolError::ValidationFailed("arguments must be a JSON object".into()))?;

        for key in obj.keys() {
            if schema.get(key).is_none() {
                return Err(ToolError::ValidationFailed(format!(
                    "unknown parameter: {key}"
                )));
            }
        }

        for spec in &schema.0 {
            let value = obj.get(&spec.name).or(spec.default.as_ref());
            let value = match value {
                Some(v) => v,
                None if spec.required => {
                    return Err(ToolError::ValidationFailed(format!(
                        "missing required parameter: {}",
                        spec.name
                    )));
                }
                None => continue,
            };

            let type_ok = match spec.param_type {
                ParamType::String => value.is_string(),
                ParamType::Integer => value.is_i64() || value.is_u64(),
                ParamType::Number => value.is_number(),
                ParamType::Boolean => value.is_boolean(),
                ParamType::Array => value.is_array(),
                ParamType::Object => value.is_object(),
            };
            if !type_ok {
                return Err(ToolError::ValidationFailed(format!(
                    "parameter {} has wrong type",
                    spec.name
                )));
            }

            if let Some(allowed) = &spec.r#enum {
                if !allowed.contains(value) {
                    return Err(ToolError::ValidationFailed(format!(
                        "parameter {} is not one of the allowed values",
                        spec.name
                    )));
                }
            }

            if let Some(n) = value.as_f64() {
                if let Some(min) = spec.min {
                    if n < min {
                        return Err(ToolError::ValidationFailed(format!(
                            "parameter {} is below the minimum",
                            spec.name
                        )));
                    }
                }
                if let Some(max) = spec.max {
                    if n > max {
                        return Err(ToolError::ValidationFailed(format!(
                            "parameter {} is above the maximum",
                            spec.name
                        )));
                    }
                }
            }

            if let (Some(pattern), Some(s)) = (&spec.pattern, value.as_str()) {
                let re = regex::Regex::new(pattern).map_err(|e| {
                    ToolError::ValidationFailed(format!("invalid pattern for {}: {e}", spec.name))
                })?;
                if !re.is_match(s) {
                    return Err(ToolError::ValidationFailed(format!(
                        "parameter {} does not match the required pattern",
                        spec.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Export every tool's planner-facing schema.
    pub fn export_schemas_for_planner(&self) -> Vec<serde_json::Value> {
        self.tools
            .values()
            .map(|t| t.definition().to_planner_schema())
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarvis_types::{ParameterSchema, ParameterSpec};
    use serde_json::json;

    fn def(name: &str, schema: ParameterSchema) -> ToolDefinition {
        ToolDefinition {
            name: name.into(),
            description: "test tool".into(),
            parameter_schema: schema,
            permission_level: PermissionLevel::Read,
            timeout_seconds: 5,
            requires_confirmation: false,
            category: "test".into(),
        }
    }

    struct EchoTool(ToolDefinition);

    impl ToolDyn for EchoTool {
        fn definition(&self) -> &ToolDefinition {
            &self.0
        }
        fn call(
            &self,
            input: serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>>
        {
            Box::pin(async move { Ok(json!({"echoed": input})) })
        }
    }

    fn _assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn tool_dyn_is_object_safe() {
        _assert_send_sync::<Arc<dyn ToolDyn>>();
    }

    #[test]
    fn registry_add_and_get() {
        let mut reg = ToolRegistry::new();
        assert!(reg.is_empty());
        reg.register(Arc::new(EchoTool(def("echo", ParameterSchema::empty()))));
        assert_eq!(reg.len(), 1);
        assert!(reg.get("echo").is_some());
        assert!(reg.get("nonexistent").is_none());
    }

    #[tokio::test]
    async fn registry_call_tool() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool(def("echo", ParameterSchema::empty()))));
        let tool = reg.get("echo").unwrap();
        let result = tool.call(json!({"msg": "hello"})).await.unwrap();
        assert_eq!(result, json!({"echoed": {"msg": "hello"}}));
    }

    #[test]
    fn validate_call_rejects_unknown_tool() {
        let reg = ToolRegistry::new();
        let err = reg.validate_call("make_coffee", &json!({})).unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[test]
    fn validate_call_rejects_unknown_parameter() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool(def("echo", ParameterSchema::empty()))));
        let err = reg
            .validate_call("echo", &json!({"surprise": true}))
            .unwrap_err();
        assert!(matches!(err, ToolError::ValidationFailed(_)));
    }

    #[test]
    fn validate_call_rejects_missing_required_parameter() {
        let mut reg = ToolRegistry::new();
        let schema = ParameterSchema(vec![ParameterSpec::required(
            "app_name",
            ParamType::String,
        )]);
        reg.register(Arc::new(EchoTool(def("open_application", schema))));
        let err = reg
            .validate_call("open_application", &json!({}))
            .unwrap_err();
        assert!(matches!(err, ToolError::ValidationFailed(_)));
    }

    #[test]
    fn validate_call_accepts_well_formed_args() {
        let mut reg = ToolRegistry::new();
        let schema = ParameterSchema(vec![ParameterSpec::required(
            "app_name",
            ParamType::String,
        )]);
        reg.register(Arc::new(EchoTool(def("open_application", schema))));
        assert!(reg
            .validate_call("open_application", &json!({"app_name": "Safari"}))
            .is_ok());
    }

    #[test]
    fn validate_call_enforces_numeric_range() {
        let mut reg = ToolRegistry::new();
        let mut spec = ParameterSpec::required("volume", ParamType::Integer);
        spec.min = Some(0.0);
        spec.max = Some(100.0);
        reg.register(Arc::new(EchoTool(def(
            "set_volume",
            ParameterSchema(vec![spec]),
        ))));
        assert!(reg
            .validate_call("set_volume", &json!({"volume": 150}))
            .is_err());
        assert!(reg
            .validate_call("set_volume", &json!({"volume": 50}))
            .is_ok());
    }

    #[test]
    fn export_schemas_marks_additional_properties_false() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool(def("echo", ParameterSchema::empty()))));
        let schemas = reg.export_schemas_for_planner();
        assert_eq!(schemas.len(), 1);
        assert_eq!(
            schemas[0]["parameters"]["additionalProperties"],
            json!(false)
        );
    }
}
