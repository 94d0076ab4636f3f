//! Tool call types for agent interactions

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::agents::error::ToolCallError;

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Name of the tool being called
    pub name: String,
    /// Arguments passed to the tool (as JSON)
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Result of executing a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// ID of the tool call this is responding to
    pub tool_call_id: String,
    /// Name of the tool that was called
    pub tool_name: String,
    /// Input arguments that were passed
    pub input: Value,
    /// Output returned by the tool
    pub output: Value,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
    /// Whether the tool execution succeeded
    pub success: bool,
    /// Error message if execution failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error classification if execution failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl ToolCallResult {
    /// Create a successful tool call result
    pub fn success(call: &ToolCall, output: Value, execution_time_ms: u64) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            input: call.arguments.clone(),
            output,
            execution_time_ms,
            success: true,
            error: None,
            error_kind: None,
        }
    }

    /// Create a failed tool call result
    pub fn failure(call: &ToolCall, error: &ToolCallError, execution_time_ms: u64) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            input: call.arguments.clone(),
            output: Value::Null,
            execution_time_ms,
            success: false,
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
        }
    }

    /// Payload fed back to the model for this call
    pub fn message_payload(&self) -> Value {
        match (&self.error, &self.error_kind) {
            (Some(error), kind) => json!({
                "error": error,
                "kind": kind.as_deref().unwrap_or("error"),
            }),
            (None, _) => self.output.clone(),
        }
    }

    /// Size of the serialized output in bytes
    pub fn result_bytes(&self) -> usize {
        serde_json::to_vec(&self.message_payload())
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

/// Definition of a tool offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema defining the tool's parameters
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}
