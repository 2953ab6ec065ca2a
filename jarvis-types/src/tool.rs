//! Tool and parameter-schema data model.

use crate::permission::PermissionLevel;
use serde::{Deserialize, Serialize};

/// A parameter's declared type, drawn from the closed JSON-Schema-like set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// UTF-8 string.
    String,
    /// Signed integer.
    Integer,
    /// Floating point number.
    Number,
    /// Boolean.
    Boolean,
    /// Ordered list.
    Array,
    /// Nested object (opaque to the registry beyond presence).
    Object,
}

/// One parameter in a tool's schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name, unique within its tool's schema.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Whether omitting this parameter is a validation error.
    pub required: bool,
    /// Default value used when the parameter is omitted and not required.
    pub default: Option<serde_json::Value>,
    /// Closed set of allowed values, if any.
    pub r#enum: Option<Vec<serde_json::Value>>,
    /// Inclusive minimum, for numeric types.
    pub min: Option<f64>,
    /// Inclusive maximum, for numeric types.
    pub max: Option<f64>,
    /// Regex the value must match, for string types.
    pub pattern: Option<String>,
}

impl ParameterSpec {
    /// Construct a required parameter with no further constraints.
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            default: None,
            r#enum: None,
            min: None,
            max: None,
            pattern: None,
        }
    }

    /// Construct an optional parameter with a default value.
    pub fn optional(name: impl Into<String>, param_type: ParamType, default: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            default: Some(default),
            r#enum: None,
            min: None,
            max: None,
            pattern: None,
        }
    }
}

/// Ordered parameter schema for one tool. Closed-world: unknown parameter
/// names passed at call time are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterSchema(pub Vec<ParameterSpec>);

impl ParameterSchema {
    /// An empty schema (tool takes no arguments).
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Look up a parameter spec by name.
    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.0.iter().find(|p| p.name == name)
    }

    /// JSON-Schema-shaped export for the planner.
    pub fn to_planner_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for p in &self.0 {
            let type_str = match p.param_type {
                ParamType::String => "string",
                ParamType::Integer => "integer",
                ParamType::Number => "number",
                ParamType::Boolean => "boolean",
                ParamType::Array => "array",
                ParamType::Object => "object",
            };
            let mut prop = serde_json::json!({ "type": type_str });
            if let Some(values) = &p.r#enum {
                prop["enum"] = serde_json::Value::Array(values.clone());
            }
            if let Some(min) = p.min {
                prop["minimum"] = serde_json::json!(min);
            }
            if let Some(max) = p.max {
                prop["maximum"] = serde_json::json!(max);
            }
            if let Some(pattern) = &p.pattern {
                prop["pattern"] = serde_json::json!(pattern);
            }
            properties.insert(p.name.clone(), prop);
            if p.required {
                required.push(p.name.clone());
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": serde_json::Value::Object(properties),
            "required": required,
            "additionalProperties": false,
        })
    }
}

/// A registered tool: catalog entry plus execution metadata.
///
/// The executor (crate `jarvis-executor`) holds the actual execution
/// closure/trait object separately, keyed by `name` — this struct is the
/// catalog-facing, serializable half of a tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description, surfaced to the planner.
    pub description: String,
    /// Ordered parameter schema.
    pub parameter_schema: ParameterSchema,
    /// Required privilege level to invoke this tool.
    pub permission_level: PermissionLevel,
    /// Hard wall-clock timeout for a single invocation.
    pub timeout_seconds: u64,
    /// Whether a valid grant at this level still requires interactive
    /// confirmation before execution.
    pub requires_confirmation: bool,
    /// Free-form grouping used for `list_by_category`.
    pub category: String,
}

impl ToolDefinition {
    /// The planner-facing function-description object for this tool
    ///.
    pub fn to_planner_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.parameter_schema.to_planner_schema(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planner_schema_marks_additional_properties_false() {
        let schema = ParameterSchema(vec![ParameterSpec::required("app_name", ParamType::String)]);
        let exported = schema.to_planner_schema();
        assert_eq!(exported["additionalProperties"], serde_json::json!(false));
        assert_eq!(exported["required"], serde_json::json!(["app_name"]));
    }

    #[test]
    fn empty_schema_has_no_required_fields() {
        let schema = ParameterSchema::empty();
        let exported = schema.to_planner_schema();
        assert_eq!(exported["required"], serde_json::json!([] as [String; 0]));
    }
}
