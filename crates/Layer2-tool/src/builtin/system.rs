//! System tools - pwd, system_info, which

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use toolgate_foundation::{
    Tool, ToolArgs, ToolContext, ToolError, ToolMeta, ToolOutput, ToolSchema,
};

// ============================================================================
// pwd
// ============================================================================

/// Print the sandbox root
pub struct PwdTool;

impl PwdTool {
    pub const NAME: &'static str = "pwd";

    pub fn new() -> Self {
        Self
    }
}

impl Default for PwdTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for PwdTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn meta(&self) -> ToolMeta {
        ToolMeta::new(Self::NAME)
            .description("Print the sandbox root directory")
            .category("system")
    }

    fn schema(&self) -> Value {
        ToolSchema::new().build()
    }

    async fn execute(
        &self,
        ctx: &dyn ToolContext,
        _args: &ToolArgs,
    ) -> Result<ToolOutput, ToolError> {
        ctx.checkpoint()?;
        Ok(ToolOutput::success(ctx.sandbox_root().display().to_string()))
    }
}

// ============================================================================
// system_info
// ============================================================================

/// Host summary
pub struct SystemInfoTool;

impl SystemInfoTool {
    pub const NAME: &'static str = "system_info";

    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemInfoTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SystemInfoTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn meta(&self) -> ToolMeta {
        ToolMeta::new(Self::NAME)
            .description("Report OS, architecture, hostname, CPU count and local time")
            .category("system")
    }

    fn schema(&self) -> Value {
        ToolSchema::new().build()
    }

    async fn execute(
        &self,
        ctx: &dyn ToolContext,
        _args: &ToolArgs,
    ) -> Result<ToolOutput, ToolError> {
        ctx.checkpoint()?;

        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let lines = [
            format!("os: {}", std::env::consts::OS),
            format!("family: {}", std::env::consts::FAMILY),
            format!("arch: {}", std::env::consts::ARCH),
            format!("hostname: {}", host),
            format!("cpus: {}", cpus),
            format!("time: {}", chrono::Local::now().to_rfc3339()),
        ];
        Ok(ToolOutput::success(lines.join("\n")))
    }
}

// ============================================================================
// which
// ============================================================================

#[derive(Debug, Deserialize)]
struct WhichInput {
    program: String,
}

/// Locate an executable on PATH
pub struct WhichTool;

impl WhichTool {
    pub const NAME: &'static str = "which";

    pub fn new() -> Self {
        Self
    }

    fn parse(args: &ToolArgs) -> Result<WhichInput, ToolError> {
        let input: WhichInput = args.parse(Self::NAME)?;
        if input.program.trim().is_empty() {
            return Err(ToolError::validation(Self::NAME, "program cannot be empty"));
        }
        Ok(input)
    }
}

impl Default for WhichTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WhichTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn meta(&self) -> ToolMeta {
        ToolMeta::new(Self::NAME)
            .description("Find the full path of an executable on PATH")
            .category("system")
    }

    fn schema(&self) -> Value {
        ToolSchema::new()
            .string_param("program", "Executable name", true)
            .build()
    }

    fn validate(&self, args: &ToolArgs) -> Result<(), ToolError> {
        Self::parse(args).map(|_| ())
    }

    async fn execute(
        &self,
        ctx: &dyn ToolContext,
        args: &ToolArgs,
    ) -> Result<ToolOutput, ToolError> {
        ctx.checkpoint()?;
        let input = Self::parse(args)?;

        match which::which(&input.program) {
            Ok(path) => Ok(ToolOutput::success(path.display().to_string())),
            Err(_) => Err(ToolError::execution(
                Self::NAME,
                format!("{}: not found", input.program),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::test_support::{args, content, Fixture};
    use serde_json::json;

    #[tokio::test]
    async fn test_pwd_is_sandbox_root() {
        let fx = Fixture::new();
        let out = PwdTool::new()
            .execute(&fx.ctx("pwd"), &args(json!({})))
            .await
            .unwrap();
        assert_eq!(content(out), fx.root.display().to_string());
    }

    #[tokio::test]
    async fn test_system_info_fields() {
        let fx = Fixture::new();
        let out = content(
            SystemInfoTool::new()
                .execute(&fx.ctx("system_info"), &args(json!({})))
                .await
                .unwrap(),
        );
        for key in ["os:", "family:", "arch:", "hostname:", "cpus:", "time:"] {
            assert!(out.contains(key), "missing {key} in {out}");
        }
        assert!(out.contains(std::env::consts::OS));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_which() {
        let fx = Fixture::new();
        let tool = WhichTool::new();

        let out = content(
            tool.execute(&fx.ctx("which"), &args(json!({"program": "sh"})))
                .await
                .unwrap(),
        );
        assert!(out.ends_with("/sh"));

        let err = tool
            .execute(
                &fx.ctx("which"),
                &args(json!({"program": "definitely-not-a-real-program-xyz"})),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(tool.validate(&args(json!({"program": ""}))).is_err());
    }

    #[tokio::test]
    async fn test_cancelled_context_short_circuits() {
        let fx = Fixture::new();
        let ctx = fx.ctx("pwd");
        ctx.cancel();
        let err = PwdTool::new()
            .execute(&ctx, &args(json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::DeadlineExceeded { .. }));
    }
}
