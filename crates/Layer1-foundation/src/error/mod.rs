//! Error types for Toolgate
//!
//! Two layers of errors live here:
//! - [`Error`]: crate-level failures (configuration, registration, I/O)
//! - [`ToolError`]: the per-call taxonomy carried inside a `ToolResult`

use std::time::Duration;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Toolgate error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Registration
    // ========================================================================
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Tool '{tool}' {version} is not compatible with host {host}")]
    IncompatibleTool {
        tool: String,
        version: String,
        host: String,
    },

    #[error("Sandbox root unavailable: {0}")]
    SandboxRoot(String),

    // ========================================================================
    // General
    // ========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // Conversions from external errors
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

/// Failure of a single tool call.
///
/// Gate failures (lookup, validation, policy, rate limit) are produced before
/// the executor runs; everything else comes out of the execution stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments for '{tool}': {message}")]
    Validation { tool: String, message: String },

    #[error("Tool '{0}' is not allowed by policy")]
    NotAllowed(String),

    #[error("Tool '{0}' was denied by the user")]
    DeniedByUser(String),

    #[error("Rate limited: '{tool}' (retry in {retry_after_secs}s)")]
    RateLimited { tool: String, retry_after_secs: u64 },

    #[error("Deadline exceeded: '{tool}' did not finish within {timeout_ms}ms")]
    DeadlineExceeded { tool: String, timeout_ms: u64 },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Path escapes sandbox: {0}")]
    PathEscapesSandbox(String),

    #[error("Access to sensitive path denied: {0}")]
    SensitivePath(String),

    #[error("Tool execution failed: {tool} - {message}")]
    Execution { tool: String, message: String },
}

impl ToolError {
    /// Tool execution error helper
    pub fn execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        ToolError::Execution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Validation error helper
    pub fn validation(tool: impl Into<String>, message: impl Into<String>) -> Self {
        ToolError::Validation {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn deadline(tool: impl Into<String>, timeout: Duration) -> Self {
        ToolError::DeadlineExceeded {
            tool: tool.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Only rate limiting is worth retrying; the caller decides when.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ToolError::RateLimited { .. })
    }

    /// Blocked by policy or by the user
    pub fn is_policy_block(&self) -> bool {
        matches!(self, ToolError::NotAllowed(_) | ToolError::DeniedByUser(_))
    }

    /// Raised by the path sandbox
    pub fn is_sandbox_violation(&self) -> bool {
        matches!(
            self,
            ToolError::InvalidPath(_)
                | ToolError::PathEscapesSandbox(_)
                | ToolError::SensitivePath(_)
        )
    }

    /// Stable label for log fields and CLI output
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::NotFound(_) => "not_found",
            ToolError::Validation { .. } => "validation_error",
            ToolError::NotAllowed(_) => "not_allowed",
            ToolError::DeniedByUser(_) => "denied_by_user",
            ToolError::RateLimited { .. } => "rate_limited",
            ToolError::DeadlineExceeded { .. } => "deadline_exceeded",
            ToolError::InvalidPath(_) => "invalid_path",
            ToolError::PathEscapesSandbox(_) => "path_escapes_sandbox",
            ToolError::SensitivePath(_) => "sensitive_path",
            ToolError::Execution { .. } => "execution_error",
        }
    }
}
