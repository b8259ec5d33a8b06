//! Tool Registry - the single execute entry point
//!
//! Owns every registered tool and composes the gates around them:
//!
//! ```text
//! execute(name, args, options)
//!   1. lookup          unknown name      -> NotFound
//!   2. validate        bad arguments     -> Validation
//!   3. policy          deny              -> NotAllowed
//!                      not yet approved  -> awaiting approval (no error)
//!   4. rate limit      over budget       -> RateLimited
//!   5. deadline        already elapsed   -> DeadlineExceeded (executor never runs)
//!   6. execute         raced against the deadline, partial output kept
//! ```
//!
//! Steps 3-5 run under one lock; the executor itself runs outside it.
//!
//! ```ignore
//! let registry = ToolRegistry::builder()
//!     .sandbox_root("/work/project")
//!     .policy(Policy::new().allow("ls").deny("execute_shell_command"))
//!     .with_builtins()
//!     .build()?;
//!
//! let result = registry.execute("ls", "{}", ExecuteOptions::default()).await;
//! ```

use crate::builtin;
use crate::context::RuntimeContext;
use crate::limiter::{RateLimitStats, RateLimiter, TimeoutPolicy};
use crate::runner::HostRunner;
use crate::sandbox::Sandbox;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use toolgate_foundation::semver::Version;
use toolgate_foundation::{
    ApprovalDelegate, ApprovalRequest, ApprovalResponse, CancellationToken, CommandRunner,
    Decision, Error, ExecuteOptions, LimitsConfig, Permission, Policy, PolicyEngine,
    RateLimitConfig, Result, TimeoutConfig, Tool, ToolArgs, ToolCall, ToolError, ToolOutput,
    ToolResult, ToolgateConfig,
};
use tracing::{debug, info, warn};

/// Time an executor gets to hand back partial output after its deadline
pub const CANCEL_GRACE: Duration = Duration::from_millis(500);

/// Default concurrency for [`ToolRegistry::execute_batch`]
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Mutable policy state, all behind one lock
struct GateState {
    engine: PolicyEngine,
    limiter: RateLimiter,
    timeouts: TimeoutPolicy,
}

/// Outcome counters for a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub total_calls: usize,
    pub successful: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub awaiting_approval: usize,
    pub total_duration_ms: u64,
}

/// Registry of tools plus the gates every call passes through
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    sandbox: Sandbox,
    limits: Arc<LimitsConfig>,
    runner: Arc<dyn CommandRunner>,
    host_version: Version,
    state: Mutex<GateState>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered names, sorted
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn sandbox_root(&self) -> &Path {
        self.sandbox.base()
    }

    pub fn host_version(&self) -> &Version {
        &self.host_version
    }

    /// Function definitions for a model API
    pub fn definitions(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| {
                let meta = tool.meta();
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": meta.name,
                        "description": meta.description,
                        "parameters": tool.schema(),
                    }
                })
            })
            .collect()
    }

    /// Name, description and input schema per tool
    pub fn schemas(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| {
                let meta = tool.meta();
                serde_json::json!({
                    "name": meta.name,
                    "description": meta.description,
                    "category": meta.category,
                    "version": meta.version.to_string(),
                    "input_schema": tool.schema(),
                })
            })
            .collect()
    }

    // ========================================================================
    // Permissions & limits
    // ========================================================================

    pub fn get_permission(&self, name: &str) -> Option<Permission> {
        self.state.lock().engine.get(name)
    }

    /// Every tool's permission, sorted by name
    pub fn permissions(&self) -> Vec<(String, Permission)> {
        self.state.lock().engine.snapshot()
    }

    pub fn is_denied(&self, name: &str) -> bool {
        self.state.lock().engine.is_denied(name)
    }

    pub fn set_allowed(&self, name: &str, allowed: bool) -> std::result::Result<(), ToolError> {
        self.state.lock().engine.set_allowed(name, allowed)
    }

    pub fn set_require_confirmation(
        &self,
        name: &str,
        required: bool,
    ) -> std::result::Result<(), ToolError> {
        self.state.lock().engine.set_require_confirmation(name, required)
    }

    /// Allow a tool; `always` also drops the confirmation requirement for the session
    pub fn allow_tool(&self, name: &str, always: bool) -> std::result::Result<(), ToolError> {
        self.state.lock().engine.allow(name, always)
    }

    /// Replace rate limits; call histories are kept
    pub fn configure_rate_limits(&self, config: RateLimitConfig) {
        self.state.lock().limiter.reconfigure(config);
        info!("Rate limits reconfigured");
    }

    pub fn configure_timeouts(&self, config: TimeoutConfig) {
        self.state.lock().timeouts.reconfigure(config);
        info!("Timeouts reconfigured");
    }

    pub fn rate_limit_stats(&self) -> RateLimitStats {
        self.state.lock().limiter.stats()
    }

    pub fn effective_timeout(&self, name: &str) -> Duration {
        self.state.lock().timeouts.effective(name)
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Run one call through every gate
    pub async fn execute(
        &self,
        name: &str,
        args: impl Into<ToolArgs>,
        options: ExecuteOptions,
    ) -> ToolResult {
        let args = args.into();
        let start = Instant::now();

        let result = self.run_gated(name, &args, options).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match (&result.error, result.needs_approval()) {
            (_, true) => debug!(tool = name, stage = "policy", duration_ms, "Awaiting approval"),
            (None, _) => info!(tool = name, stage = "done", duration_ms, "Tool executed"),
            (Some(err), _) => {
                debug!(tool = name, stage = "done", duration_ms, kind = err.kind(), "Tool failed")
            }
        }

        result.with_duration(duration_ms)
    }

    /// Execute a call from the chat layer; the call id is copied to the result
    pub async fn execute_tool_call(&self, call: &ToolCall, options: ExecuteOptions) -> ToolResult {
        self.execute(&call.name, call.args(), options)
            .await
            .with_call_id(&call.id)
    }

    /// Execute, asking `delegate` when the policy wants approval.
    ///
    /// - `AllowOnce` runs this call with `force`
    /// - `AlwaysAllow` grants the tool for the session, then runs it
    /// - `Deny` ends the call with `DeniedByUser`; the policy is untouched
    pub async fn execute_with_approval(
        &self,
        call: &ToolCall,
        delegate: &dyn ApprovalDelegate,
    ) -> ToolResult {
        let result = self.execute_tool_call(call, ExecuteOptions::default()).await;
        let Some(request) = result.approval.clone() else {
            return result;
        };

        match delegate.request_approval(&request).await {
            ApprovalResponse::AllowOnce => {
                debug!(tool = %call.name, "Approved once");
                self.execute_tool_call(call, ExecuteOptions::forced()).await
            }
            ApprovalResponse::AlwaysAllow => {
                if let Err(e) = self.allow_tool(&call.name, true) {
                    return ToolResult::error(&call.name, e).with_call_id(&call.id);
                }
                self.execute_tool_call(call, ExecuteOptions::default()).await
            }
            ApprovalResponse::Deny => {
                info!(tool = %call.name, "Denied by user");
                ToolResult::error(&call.name, ToolError::DeniedByUser(call.name.clone()))
                    .with_call_id(&call.id)
            }
        }
    }

    /// Execute several calls concurrently. Results come back in call order.
    pub async fn execute_batch(
        &self,
        calls: &[ToolCall],
        max_concurrency: usize,
        options: ExecuteOptions,
    ) -> (Vec<ToolResult>, BatchStats) {
        let start = Instant::now();
        let max_concurrency = max_concurrency.max(1);
        info!(
            "Starting batch of {} tool calls with max_concurrency={}",
            calls.len(),
            max_concurrency
        );

        let semaphore = Arc::new(Semaphore::new(max_concurrency));
        let futures = calls.iter().map(|call| {
            let sem = Arc::clone(&semaphore);
            async move {
                let _permit = sem.acquire().await.ok();
                self.execute_tool_call(call, options).await
            }
        });
        let results = join_all(futures).await;

        let mut stats = BatchStats {
            total_calls: results.len(),
            ..Default::default()
        };
        for result in &results {
            if result.needs_approval() {
                stats.awaiting_approval += 1;
            } else if result.is_success() {
                stats.successful += 1;
            } else {
                if matches!(result.error, Some(ToolError::DeadlineExceeded { .. })) {
                    stats.timed_out += 1;
                }
                stats.failed += 1;
            }
        }
        stats.total_duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Batch completed: {} total, {} success, {} failed, {} timed out, {} awaiting approval, {}ms",
            stats.total_calls,
            stats.successful,
            stats.failed,
            stats.timed_out,
            stats.awaiting_approval,
            stats.total_duration_ms
        );

        (results, stats)
    }

    async fn run_gated(&self, name: &str, args: &ToolArgs, options: ExecuteOptions) -> ToolResult {
        let Some(tool) = self.get(name) else {
            warn!(tool = name, stage = "lookup", "Tool not found");
            return ToolResult::error(name, ToolError::NotFound(name.to_string()));
        };

        if let Err(e) = tool.validate(args) {
            debug!(tool = name, stage = "validate", error = %e, "Validation failed");
            return ToolResult::error(name, e);
        }

        let (timeout, deadline) = {
            let mut state = self.state.lock();

            match state.engine.decide(name, &options) {
                Decision::Denied => {
                    warn!(tool = name, stage = "policy", "Blocked by deny policy");
                    return ToolResult::error(name, ToolError::NotAllowed(name.to_string()));
                }
                Decision::NeedsApproval(reason) => {
                    return ToolResult::approval_required(ApprovalRequest {
                        tool: name.to_string(),
                        reason,
                        arguments: args.as_str().to_string(),
                    });
                }
                Decision::Authorized => {}
            }

            if let Err(e) = state.limiter.check(name) {
                warn!(tool = name, stage = "rate_limit", "{}", e);
                return ToolResult::error(name, e);
            }

            state.timeouts.deadline_for(name, Instant::now())
        };

        if timeout.is_zero() || Instant::now() >= deadline {
            warn!(tool = name, stage = "deadline", "Deadline elapsed before start");
            return ToolResult::error(name, ToolError::deadline(name, timeout));
        }

        debug!(
            tool = name,
            stage = "execute",
            timeout_ms = timeout.as_millis() as u64,
            "Invoking"
        );
        let output = self.invoke(tool.as_ref(), name, args, timeout, deadline).await;
        ToolResult::from_output(name, output)
    }

    /// Run the executor against its deadline
    async fn invoke(
        &self,
        tool: &dyn Tool,
        name: &str,
        args: &ToolArgs,
        timeout: Duration,
        deadline: Instant,
    ) -> ToolOutput {
        let cancel = CancellationToken::new();
        let ctx = RuntimeContext::new(
            name,
            self.sandbox.base(),
            Arc::clone(&self.limits),
            Arc::clone(&self.runner),
            timeout,
        )
        .with_deadline(timeout, deadline)
        .with_cancellation(cancel.clone());

        let execution = tool.execute(&ctx, args);
        tokio::pin!(execution);

        tokio::select! {
            result = &mut execution => return flatten(result),
            _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {}
        }

        cancel.cancel();
        warn!(
            tool = name,
            stage = "deadline",
            timeout_ms = timeout.as_millis() as u64,
            "Deadline exceeded, cancelling"
        );

        let partial = match tokio::time::timeout(CANCEL_GRACE, &mut execution).await {
            Ok(Ok(output)) => output.content,
            Ok(Err(_)) | Err(_) => String::new(),
        };
        ToolOutput::partial(partial, ToolError::deadline(name, timeout))
    }
}

fn flatten(result: std::result::Result<ToolOutput, ToolError>) -> ToolOutput {
    result.unwrap_or_else(ToolOutput::failure)
}

// ============================================================================
// Builder
// ============================================================================

/// Collects tools and configuration; [`build`](Self::build) validates both
pub struct ToolRegistryBuilder {
    sandbox_root: Option<PathBuf>,
    policy: Policy,
    limits: LimitsConfig,
    rate_limits: RateLimitConfig,
    timeouts: TimeoutConfig,
    runner: Option<Arc<dyn CommandRunner>>,
    host_version: Version,
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self {
            sandbox_root: None,
            policy: Policy::default(),
            limits: LimitsConfig::default(),
            rate_limits: RateLimitConfig::default(),
            timeouts: TimeoutConfig::default(),
            runner: None,
            host_version: host_version(),
            tools: Vec::new(),
        }
    }

    /// Defaults to the current directory
    pub fn sandbox_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sandbox_root = Some(root.into());
        self
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    pub fn rate_limits(mut self, config: RateLimitConfig) -> Self {
        self.rate_limits = config;
        self
    }

    pub fn timeouts(mut self, config: TimeoutConfig) -> Self {
        self.timeouts = config;
        self
    }

    /// Policy, limits, rate limits and timeouts from a loaded config file
    pub fn config(self, config: &ToolgateConfig) -> Self {
        self.policy(config.policy.clone())
            .limits(config.limits.clone())
            .rate_limits(config.rate_limits.clone())
            .timeouts(config.timeouts.clone())
    }

    /// Defaults to [`HostRunner`]
    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn host_version(mut self, version: Version) -> Self {
        self.host_version = version;
        self
    }

    pub fn register(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_builtins(mut self) -> Self {
        self.tools.extend(builtin::all_tools());
        self
    }

    pub fn build(self) -> Result<ToolRegistry> {
        let root = match self.sandbox_root {
            Some(root) => root,
            None => std::env::current_dir()?,
        };
        let sandbox = Sandbox::new(&root)
            .map_err(|e| Error::SandboxRoot(format!("{}: {}", root.display(), e)))?;

        let mut tools: BTreeMap<String, Arc<dyn Tool>> = BTreeMap::new();
        for tool in self.tools {
            let name = tool.name().to_string();
            if tools.contains_key(&name) {
                return Err(Error::DuplicateTool(name));
            }
            if !tool.compatible_with(&self.host_version) {
                return Err(Error::IncompatibleTool {
                    tool: name,
                    version: tool.meta().version.to_string(),
                    host: self.host_version.to_string(),
                });
            }
            tools.insert(name, tool);
        }

        for name in self.policy.deny.iter().chain(&self.policy.allow) {
            if !tools.contains_key(name) {
                debug!("Policy names unregistered tool '{}'", name);
            }
        }

        let engine = PolicyEngine::new(&self.policy, tools.keys().map(String::as_str));
        info!(
            root = %sandbox.base().display(),
            tools = tools.len(),
            "Tool registry ready"
        );

        Ok(ToolRegistry {
            tools,
            sandbox,
            limits: Arc::new(self.limits),
            runner: self
                .runner
                .unwrap_or_else(|| Arc::new(HostRunner::new()) as Arc<dyn CommandRunner>),
            host_version: self.host_version,
            state: Mutex::new(GateState {
                engine,
                limiter: RateLimiter::new(self.rate_limits),
                timeouts: TimeoutPolicy::new(self.timeouts),
            }),
        })
    }
}

impl Default for ToolRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// This crate's version as the host version tools are checked against
fn host_version() -> Version {
    Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::new(0, 1, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use toolgate_foundation::semver::VersionReq;
    use toolgate_foundation::{ToolContext, ToolMeta, ToolSchema};

    /// Counts invocations; sleeps when asked
    struct StubTool {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        sleep: Duration,
        requires: VersionReq,
    }

    impl StubTool {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                calls: Arc::new(AtomicUsize::new(0)),
                sleep: Duration::ZERO,
                requires: VersionReq::STAR,
            }
        }
    }

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &str {
            self.name
        }

        fn meta(&self) -> ToolMeta {
            ToolMeta::new(self.name).requires_host(self.requires.clone())
        }

        fn schema(&self) -> Value {
            ToolSchema::new().build()
        }

        async fn execute(
            &self,
            ctx: &dyn ToolContext,
            _args: &ToolArgs,
        ) -> std::result::Result<ToolOutput, ToolError> {
            ctx.checkpoint()?;
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.sleep.is_zero() {
                tokio::time::sleep(self.sleep).await;
            }
            Ok(ToolOutput::success(format!("{} ran", self.name)))
        }
    }

    fn registry_with(dir: &tempfile::TempDir, policy: Policy, tools: Vec<StubTool>) -> ToolRegistry {
        tools
            .into_iter()
            .fold(
                ToolRegistry::builder().sandbox_root(dir.path()).policy(policy),
                |b, t| b.register(Arc::new(t)),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let err = ToolRegistry::builder()
            .sandbox_root(dir.path())
            .register(Arc::new(StubTool::new("x")))
            .register(Arc::new(StubTool::new("x")))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::DuplicateTool(name) if name == "x"));
    }

    #[test]
    fn test_build_rejects_incompatible() {
        let dir = tempfile::tempdir().unwrap();
        let mut stub = StubTool::new("future");
        stub.requires = VersionReq::parse(">=99.0.0").unwrap();

        let err = ToolRegistry::builder()
            .sandbox_root(dir.path())
            .host_version(Version::new(1, 2, 3))
            .register(Arc::new(stub))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::IncompatibleTool { host, .. } if host == "1.2.3"));
    }

    #[test]
    fn test_build_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = ToolRegistry::builder()
            .sandbox_root(dir.path().join("missing"))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::SandboxRoot(_)));
    }

    #[test]
    fn test_names_sorted_and_definitions() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ToolRegistry::builder()
            .sandbox_root(dir.path())
            .with_builtins()
            .build()
            .unwrap();

        let names = registry.tool_names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names.len(), builtin::names().len());

        let defs = registry.definitions();
        assert_eq!(defs.len(), names.len());
        assert_eq!(defs[0]["type"], "function");
        assert!(registry.schemas()[0]["input_schema"].is_object());
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(&dir, Policy::new(), vec![]);
        let result = registry.execute("nope", "{}", ExecuteOptions::default()).await;
        assert_eq!(result.error, Some(ToolError::NotFound("nope".into())));
    }

    #[tokio::test]
    async fn test_approval_then_force() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubTool::new("x");
        let calls = Arc::clone(&stub.calls);
        let registry = registry_with(&dir, Policy::new(), vec![stub]);

        let held = registry.execute("x", "{}", ExecuteOptions::default()).await;
        assert!(held.needs_approval());
        assert!(held.error.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let ran = registry.execute("x", "{}", ExecuteOptions::forced()).await;
        assert!(ran.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // force is per call
        assert!(registry
            .execute("x", "{}", ExecuteOptions::default())
            .await
            .needs_approval());
    }

    #[tokio::test]
    async fn test_rate_limit_not_bypassed_by_force() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(&dir, Policy::new().allow("x"), vec![StubTool::new("x")]);
        registry.configure_rate_limits(RateLimitConfig::default().with_tool_limit("x", 1));

        assert!(registry.execute("x", "{}", ExecuteOptions::forced()).await.is_success());
        let second = registry.execute("x", "{}", ExecuteOptions::forced()).await;
        assert!(matches!(second.error, Some(ToolError::RateLimited { .. })));
        assert_eq!(registry.rate_limit_stats().throttle_events_total, 1);
    }

    #[tokio::test]
    async fn test_deadline_cancels_slow_executor() {
        let dir = tempfile::tempdir().unwrap();
        let mut stub = StubTool::new("slow");
        stub.sleep = Duration::from_secs(30);
        let registry = registry_with(&dir, Policy::new().allow("slow"), vec![stub]);
        registry.configure_timeouts(TimeoutConfig {
            default_seconds: 1,
            ..Default::default()
        });

        let started = Instant::now();
        let result = registry.execute("slow", "{}", ExecuteOptions::default()).await;
        assert!(matches!(
            result.error,
            Some(ToolError::DeadlineExceeded { timeout_ms: 1000, .. })
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_mutators_reject_unknown_tool() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(&dir, Policy::new(), vec![StubTool::new("x")]);
        assert!(registry.set_allowed("missing", true).is_err());
        assert!(registry.allow_tool("x", true).is_ok());
        assert_eq!(
            registry.get_permission("x"),
            Some(Permission {
                allowed: true,
                require_confirmation: false
            })
        );
    }
}
