//! Tool System
//!
//! Extensible tool framework for the orchestration loop. Tools are
//! registered at runtime under a unique name; dispatch validates the
//! model-supplied arguments against the declared schema before the handler
//! ever runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ChatError, Result};
use crate::message::ToolCall;

/// Result from tool execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Call ID (if provided in request)
    pub id: Option<String>,

    /// Whether execution succeeded
    pub success: bool,

    /// Plain-text output (result body or error description)
    pub output: String,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            success: true,
            output: output.into(),
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            success: false,
            output: error.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, integer, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<serde_json::Value>>,
}

impl ParameterSchema {
    /// Required string parameter, the common case
    pub fn required_string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: "string".into(),
            description: description.into(),
            required: true,
            enum_values: None,
        }
    }

    fn matches_type(&self, value: &serde_json::Value) -> bool {
        match self.param_type.as_str() {
            "string" => value.is_string(),
            "number" => value.is_number(),
            "integer" => value.is_i64() || value.is_u64(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => true,
        }
    }
}

/// Tool definition schema, advertised to the completion service and used to
/// validate incoming arguments before dispatch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to the model)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

impl ToolSchema {
    /// Render the parameter list as a JSON Schema object, the shape the
    /// completion protocol expects under `function.parameters`.
    pub fn parameters_json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            let mut spec = serde_json::Map::new();
            spec.insert("type".into(), param.param_type.clone().into());
            spec.insert("description".into(), param.description.clone().into());
            if let Some(values) = &param.enum_values {
                spec.insert("enum".into(), values.clone().into());
            }
            properties.insert(param.name.clone(), spec.into());
            if param.required {
                required.push(serde_json::Value::from(param.name.clone()));
            }
        }

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Validate a raw argument payload against this schema
    pub fn validate(&self, arguments: &serde_json::Value) -> Result<()> {
        let Some(object) = arguments.as_object() else {
            return Err(ChatError::InvalidArguments(format!(
                "arguments for '{}' must be a JSON object",
                self.name
            )));
        };

        for param in &self.parameters {
            match object.get(&param.name) {
                None if param.required => {
                    return Err(ChatError::InvalidArguments(format!(
                        "missing required parameter: {}",
                        param.name
                    )));
                }
                None => {}
                Some(value) => {
                    if !param.matches_type(value) {
                        return Err(ChatError::InvalidArguments(format!(
                            "parameter '{}' must be of type {}",
                            param.name, param.param_type
                        )));
                    }
                    if let Some(allowed) = &param.enum_values {
                        if !allowed.contains(value) {
                            return Err(ChatError::InvalidArguments(format!(
                                "parameter '{}' must be one of {:?}",
                                param.name, allowed
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for function calling and validation
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with schema-validated arguments
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;
}

/// Registry for available tools, keyed by name.
///
/// Open to extension: registering another tool requires no change to the
/// orchestration loop.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let schema = tool.schema();
        self.tools.insert(schema.name.clone(), Arc::new(tool));
    }

    /// Register a boxed tool
    pub fn register_boxed(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        self.tools.insert(schema.name.clone(), tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Dispatch a tool call: resolve the name, validate the arguments
    /// against the declared schema, then run the handler.
    pub async fn dispatch(&self, call: &ToolCall) -> Result<ToolResult> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| ChatError::ToolNotFound(call.name.clone()))?;

        tool.schema().validate(&call.arguments)?;

        match tool.execute(call).await {
            Ok(result) => Ok(result.with_id(call.id.clone())),
            Err(e) if e.is_tool_recoverable() => Err(e),
            Err(e) => Err(ChatError::ToolExecution(e.to_string())),
        }
    }

    /// Get all tool schemas (advertised to the completion service)
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "echo".into(),
                description: "Echo the input text".into(),
                parameters: vec![ParameterSchema::required_string("text", "Text to echo")],
            }
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
            let text = call.arguments["text"].as_str().unwrap_or_default();
            Ok(ToolResult::success("echo", text))
        }
    }

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments,
        }
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        let result = registry
            .dispatch(&call("echo", json!({"text": "hi"})))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hi");
        assert_eq!(result.id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry
            .dispatch(&call("nope", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::ToolNotFound(name) if name == "nope"));
    }

    #[tokio::test]
    async fn test_dispatch_missing_required_argument() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        let err = registry
            .dispatch(&call("echo", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_dispatch_wrong_argument_type() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        let err = registry
            .dispatch(&call("echo", json!({"text": 42})))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::InvalidArguments(_)));
    }

    #[test]
    fn test_non_object_arguments_rejected() {
        let schema = EchoTool.schema();
        assert!(schema.validate(&json!("just a string")).is_err());
        assert!(schema.validate(&json!({"text": "ok"})).is_ok());
    }

    #[test]
    fn test_enum_values_enforced() {
        let schema = ToolSchema {
            name: "fmt".into(),
            description: "format".into(),
            parameters: vec![ParameterSchema {
                name: "style".into(),
                param_type: "string".into(),
                description: "Output style".into(),
                required: true,
                enum_values: Some(vec![json!("long"), json!("short")]),
            }],
        };
        assert!(schema.validate(&json!({"style": "short"})).is_ok());
        assert!(schema.validate(&json!({"style": "tiny"})).is_err());
    }

    #[test]
    fn test_parameters_json_schema_shape() {
        let schema = EchoTool.schema().parameters_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["text"]["type"], "string");
        assert_eq!(schema["required"][0], "text");
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        assert_eq!(registry.len(), 1);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("unknown").is_none());
    }
}
