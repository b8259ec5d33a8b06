//! Core Types - call, argument and result data
//!
//! These travel between the session layer and the registry:
//! - [`ToolCall`] in, [`ToolResult`] out
//! - [`ToolArgs`] / [`ToolOutput`] at the executor boundary

use crate::permission::ApprovalReason;
use crate::ToolError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Largest argument string a call may carry
pub const MAX_ARGUMENT_BYTES: usize = 1024 * 1024;

// ============================================================================
// Arguments
// ============================================================================

/// Raw argument string as emitted by the model.
///
/// Never assumed to be well-formed JSON; each tool parses it into its own
/// input type during validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolArgs(String);

impl ToolArgs {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build from a JSON value
    pub fn from_value(value: &Value) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Parse into a tool's input type. Empty input is read as `{}`.
    pub fn parse<T: DeserializeOwned>(&self, tool: &str) -> Result<T, ToolError> {
        if self.0.len() > MAX_ARGUMENT_BYTES {
            return Err(ToolError::validation(
                tool,
                format!(
                    "arguments too large ({} bytes, max {})",
                    self.0.len(),
                    MAX_ARGUMENT_BYTES
                ),
            ));
        }

        let raw = if self.is_empty() { "{}" } else { self.0.as_str() };
        serde_json::from_str(raw).map_err(|e| ToolError::validation(tool, e.to_string()))
    }
}

impl From<&str> for ToolArgs {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ToolArgs {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<Value> for ToolArgs {
    fn from(value: Value) -> Self {
        Self::from_value(&value)
    }
}

// ============================================================================
// Schema
// ============================================================================

/// JSON schema builder for tool parameters
#[derive(Debug, Clone, Default)]
pub struct ToolSchema {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl ToolSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn string_param(self, name: &str, description: &str, required: bool) -> Self {
        self.param(name, "string", description, required)
    }

    pub fn integer_param(self, name: &str, description: &str, required: bool) -> Self {
        self.param(name, "integer", description, required)
    }

    pub fn boolean_param(self, name: &str, description: &str, required: bool) -> Self {
        self.param(name, "boolean", description, required)
    }

    fn param(mut self, name: &str, kind: &str, description: &str, required: bool) -> Self {
        self.properties.insert(
            name.to_string(),
            json!({ "type": kind, "description": description }),
        );
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn build(self) -> Value {
        json!({
            "type": "object",
            "properties": Value::Object(self.properties),
            "required": self.required,
        })
    }
}

// ============================================================================
// Executor output
// ============================================================================

/// What an executor hands back. `content` may be non-empty even when
/// `error` is set (captured output of a failed command).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub content: String,
    pub error: Option<ToolError>,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            error: None,
        }
    }

    pub fn failure(error: ToolError) -> Self {
        Self {
            content: String::new(),
            error: Some(error),
        }
    }

    /// Output captured before the failure
    pub fn partial(content: impl Into<String>, error: ToolError) -> Self {
        Self {
            content: content.into(),
            error: Some(error),
        }
    }
}

// ============================================================================
// Calls and results
// ============================================================================

/// One tool call emitted by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// JSON-object-shaped argument string (unvalidated)
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    pub fn args(&self) -> ToolArgs {
        ToolArgs::new(self.arguments.clone())
    }
}

/// Per-call options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Approval was obtained out-of-band for this one call.
    /// Never bypasses deny, rate limits or timeouts.
    pub force: bool,
}

impl ExecuteOptions {
    pub fn forced() -> Self {
        Self { force: true }
    }
}

/// Returned instead of running a tool that needs approval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRequest {
    pub tool: String,
    pub reason: ApprovalReason,
    pub arguments: String,
}

/// Result of one call through the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub call_id: String,
    pub function: String,
    pub result: String,
    pub error: Option<ToolError>,
    /// Set when the call was held at the permission gate
    pub approval: Option<ApprovalRequest>,
    pub duration_ms: u64,
}

impl ToolResult {
    pub fn success(function: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            function: function.into(),
            result: result.into(),
            error: None,
            approval: None,
            duration_ms: 0,
        }
    }

    pub fn error(function: impl Into<String>, error: ToolError) -> Self {
        Self {
            call_id: String::new(),
            function: function.into(),
            result: String::new(),
            error: Some(error),
            approval: None,
            duration_ms: 0,
        }
    }

    pub fn from_output(function: impl Into<String>, output: ToolOutput) -> Self {
        Self {
            call_id: String::new(),
            function: function.into(),
            result: output.content,
            error: output.error,
            approval: None,
            duration_ms: 0,
        }
    }

    pub fn approval_required(request: ApprovalRequest) -> Self {
        Self {
            call_id: String::new(),
            function: request.tool.clone(),
            result: String::new(),
            error: None,
            approval: Some(request),
            duration_ms: 0,
        }
    }

    pub fn with_call_id(mut self, id: impl Into<String>) -> Self {
        self.call_id = id.into();
        self
    }

    pub fn with_duration(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }

    pub fn needs_approval(&self) -> bool {
        self.approval.is_some()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.approval.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct CatInput {
        path: String,
    }

    #[derive(Debug, Deserialize, Default)]
    #[serde(default)]
    struct LsInput {
        path: Option<String>,
        all: bool,
    }

    #[test]
    fn test_args_parse() {
        let args = ToolArgs::new(r#"{"path": "notes.txt"}"#);
        let input: CatInput = args.parse("cat").unwrap();
        assert_eq!(input.path, "notes.txt");
    }

    #[test]
    fn test_empty_args_are_empty_object() {
        let input: LsInput = ToolArgs::new("  ").parse("ls").unwrap();
        assert!(input.path.is_none());
        assert!(!input.all);
    }

    #[test]
    fn test_malformed_args_are_validation_errors() {
        let err = ToolArgs::new(r#"{"path": "#)
            .parse::<CatInput>("cat")
            .unwrap_err();
        assert_eq!(err.kind(), "validation_error");

        let err = ToolArgs::new("{}").parse::<CatInput>("cat").unwrap_err();
        assert!(err.to_string().contains("path"));
    }

    #[test]
    fn test_oversized_args() {
        let big = format!(r#"{{"path": "{}"}}"#, "a".repeat(MAX_ARGUMENT_BYTES));
        let err = ToolArgs::new(big).parse::<CatInput>("cat").unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_schema_builder() {
        let schema = ToolSchema::new()
            .string_param("path", "File to read", true)
            .boolean_param("all", "Include hidden", false)
            .build();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["path"]["type"], "string");
        assert_eq!(schema["properties"]["all"]["type"], "boolean");
        assert_eq!(schema["required"], json!(["path"]));
    }

    #[test]
    fn test_result_states() {
        let ok = ToolResult::success("ls", "a\nb");
        assert!(ok.is_success());

        let partial = ToolResult::from_output(
            "execute_shell_command",
            ToolOutput::partial("out", ToolError::execution("execute_shell_command", "exit 1")),
        );
        assert!(!partial.is_success());
        assert_eq!(partial.result, "out");

        let held = ToolResult::approval_required(ApprovalRequest {
            tool: "cat".into(),
            reason: ApprovalReason::NotYetAllowed,
            arguments: "{}".into(),
        })
        .with_call_id("call_1");
        assert!(held.needs_approval());
        assert!(!held.is_success());
        assert!(held.error.is_none());
        assert_eq!(held.function, "cat");
        assert_eq!(held.call_id, "call_1");
    }
}
