//! Core Traits - interfaces implemented by upper layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Layer4-CLI                                                 │
//! │  └── ApprovalDelegate impl (terminal prompt)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Layer2-Tool                                                │
//! │  ├── Tool impls (shell, ls, cat, write_file ...)            │
//! │  ├── ToolContext impl (RuntimeContext, one per call)        │
//! │  └── CommandRunner impl (HostRunner)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Layer1-Foundation (this layer)                             │
//! │  ├── Trait definitions                                      │
//! │  └── Permission policy engine                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use super::types::{ApprovalRequest, ToolArgs, ToolOutput};
use crate::config::LimitsConfig;
use crate::permission::ApprovalResponse;
use crate::ToolError;
use async_trait::async_trait;
use semver::{Version, VersionReq};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Tool Trait
// ============================================================================

/// Tool metadata
#[derive(Debug, Clone)]
pub struct ToolMeta {
    /// Unique name (registry key)
    pub name: String,
    pub description: String,
    /// filesystem, execute, system ...
    pub category: String,
    pub version: Version,
    /// Host versions this tool can run under
    pub host_requirement: VersionReq,
}

impl ToolMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            category: "general".to_string(),
            version: Version::new(0, 1, 0),
            host_requirement: VersionReq::STAR,
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn category(mut self, cat: impl Into<String>) -> Self {
        self.category = cat.into();
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn requires_host(mut self, req: VersionReq) -> Self {
        self.host_requirement = req;
        self
    }
}

/// A named capability. Tools are registered once and immutable afterwards.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name used as the registry key
    fn name(&self) -> &str;

    fn meta(&self) -> ToolMeta;

    /// JSON schema of the accepted arguments
    fn schema(&self) -> Value;

    /// Checked before the permission gate; must not have side effects.
    fn validate(&self, _args: &ToolArgs) -> Result<(), ToolError> {
        Ok(())
    }

    /// Run the tool. Long-running tools call `ctx.checkpoint()` at entry and
    /// on every loop iteration.
    async fn execute(&self, ctx: &dyn ToolContext, args: &ToolArgs)
        -> Result<ToolOutput, ToolError>;

    fn compatible_with(&self, host: &Version) -> bool {
        self.meta().host_requirement.matches(host)
    }
}

// ============================================================================
// ToolContext - per-call execution context
// ============================================================================

/// Execution context handed to a tool for one call
pub trait ToolContext: Send + Sync {
    fn tool_name(&self) -> &str;

    /// Canonical sandbox base
    fn sandbox_root(&self) -> &Path;

    fn limits(&self) -> &LimitsConfig;

    fn deadline(&self) -> Instant;

    /// Effective timeout this call was started with
    fn timeout(&self) -> Duration;

    fn cancellation(&self) -> CancellationToken;

    fn runner(&self) -> &dyn CommandRunner;

    fn is_cancelled(&self) -> bool {
        self.cancellation().is_cancelled() || Instant::now() >= self.deadline()
    }

    /// Cooperative cancellation point
    fn checkpoint(&self) -> Result<(), ToolError> {
        if self.is_cancelled() {
            Err(ToolError::deadline(self.tool_name(), self.timeout()))
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// CommandRunner - pluggable execution backend
// ============================================================================

/// A command to run
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    /// Shell command line
    pub command: String,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            cwd: cwd.into(),
            env: BTreeMap::new(),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Captured output of a command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when killed by a signal or cancelled
    pub exit_code: Option<i32>,
    pub cancelled: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.cancelled && self.exit_code == Some(0)
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Runs commands for shell-type tools. Host execution is the default; an
/// isolating backend can be swapped in without touching the tools.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    fn name(&self) -> &str;

    /// Run to completion or until `cancel` fires. On cancellation the child is
    /// killed and whatever it printed so far is returned with `cancelled` set.
    async fn run(
        &self,
        spec: CommandSpec,
        cancel: CancellationToken,
    ) -> std::io::Result<CommandOutput>;
}

// ============================================================================
// ApprovalDelegate - out-of-band approval
// ============================================================================

/// Asks someone whether a held call may run
#[async_trait]
pub trait ApprovalDelegate: Send + Sync {
    async fn request_approval(&self, request: &ApprovalRequest) -> ApprovalResponse;
}
