//! Tool Context - per-call execution context
//!
//! `RuntimeContext` implements the foundation `ToolContext` trait. The
//! registry builds one for every call that passes the gates, carrying the
//! call's deadline and cancellation token next to the sandbox root, the
//! resource limits and the command runner.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use toolgate_foundation::{CancellationToken, CommandRunner, LimitsConfig, ToolContext};

use crate::runner::HostRunner;

/// Runtime context - one per call
pub struct RuntimeContext {
    tool_name: String,
    sandbox_root: PathBuf,
    limits: Arc<LimitsConfig>,
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
    deadline: Instant,
    cancel: CancellationToken,
}

impl RuntimeContext {
    /// Context whose deadline starts now
    pub fn new(
        tool_name: impl Into<String>,
        sandbox_root: impl Into<PathBuf>,
        limits: Arc<LimitsConfig>,
        runner: Arc<dyn CommandRunner>,
        timeout: Duration,
    ) -> Self {
        let now = Instant::now();
        let deadline = now.checked_add(timeout).unwrap_or(now + Duration::from_secs(86400));
        Self {
            tool_name: tool_name.into(),
            sandbox_root: sandbox_root.into(),
            limits,
            runner,
            timeout,
            deadline,
            cancel: CancellationToken::new(),
        }
    }

    /// Host runner, default limits
    pub fn for_root(tool_name: impl Into<String>, sandbox_root: impl Into<PathBuf>) -> Self {
        Self::new(
            tool_name,
            sandbox_root,
            Arc::new(LimitsConfig::default()),
            Arc::new(HostRunner::new()),
            Duration::from_secs(toolgate_foundation::DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn with_deadline(mut self, timeout: Duration, deadline: Instant) -> Self {
        self.timeout = timeout;
        self.deadline = deadline;
        self
    }

    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = Arc::new(limits);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Cancel the call (deadline hit or caller gave up)
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl ToolContext for RuntimeContext {
    fn tool_name(&self) -> &str {
        &self.tool_name
    }

    fn sandbox_root(&self) -> &Path {
        &self.sandbox_root
    }

    fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    fn deadline(&self) -> Instant {
        self.deadline
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolgate_foundation::ToolError;

    #[test]
    fn test_checkpoint_before_deadline() {
        let ctx = RuntimeContext::for_root("ls", "/tmp");
        assert!(!ctx.is_cancelled());
        assert!(ctx.checkpoint().is_ok());
        assert_eq!(ctx.tool_name(), "ls");
        assert_eq!(ctx.limits().max_directory_entries, 1000);
    }

    #[test]
    fn test_checkpoint_after_cancel() {
        let ctx = RuntimeContext::for_root("find", "/tmp");
        ctx.cancel();
        assert!(ctx.is_cancelled());
        assert!(matches!(
            ctx.checkpoint(),
            Err(ToolError::DeadlineExceeded { .. })
        ));
    }

    #[test]
    fn test_elapsed_deadline() {
        let now = Instant::now();
        let ctx = RuntimeContext::for_root("touch", "/tmp").with_deadline(Duration::ZERO, now);
        match ctx.checkpoint() {
            Err(ToolError::DeadlineExceeded { tool, timeout_ms }) => {
                assert_eq!(tool, "touch");
                assert_eq!(timeout_ms, 0);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
