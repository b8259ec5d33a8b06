//! Shell Tool - run a command line
//!
//! Runs through the context's `CommandRunner`, so swapping the runner swaps
//! the isolation backend. The working directory is sandbox-resolved; the
//! command itself is not confined beyond that.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use toolgate_foundation::{
    CommandSpec, Tool, ToolArgs, ToolContext, ToolError, ToolMeta, ToolOutput, ToolSchema,
};
use tracing::debug;

use super::{display_path, resolve_path};

/// Shell tool input
#[derive(Debug, Deserialize)]
pub struct ShellInput {
    pub command: String,
    #[serde(default)]
    pub working_dir: Option<String>,
}

pub struct ShellTool;

impl ShellTool {
    pub const NAME: &'static str = "execute_shell_command";

    pub fn new() -> Self {
        Self
    }

    fn parse(args: &ToolArgs) -> Result<ShellInput, ToolError> {
        let input: ShellInput = args.parse(Self::NAME)?;
        if input.command.trim().is_empty() {
            return Err(ToolError::validation(Self::NAME, "command cannot be empty"));
        }
        Ok(input)
    }
}

impl Default for ShellTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn meta(&self) -> ToolMeta {
        ToolMeta::new(Self::NAME)
            .description("Execute a shell command inside the sandbox directory")
            .category("execute")
    }

    fn schema(&self) -> Value {
        ToolSchema::new()
            .string_param("command", "The command line to run", true)
            .string_param(
                "working_dir",
                "Directory to run in, relative to the sandbox root",
                false,
            )
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

        let cwd = resolve_path(ctx, input.working_dir.as_deref().unwrap_or("."))?;
        if !cwd.is_dir() {
            return Err(ToolError::execution(
                Self::NAME,
                format!("{}: not a directory", display_path(ctx, &cwd)),
            ));
        }

        debug!(command = %input.command, runner = ctx.runner().name(), "Running command");
        let output = ctx
            .runner()
            .run(CommandSpec::new(&input.command, cwd), ctx.cancellation())
            .await
            .map_err(|e| ToolError::execution(Self::NAME, format!("failed to spawn: {}", e)))?;

        let combined = output.combined();

        if output.cancelled {
            return Ok(ToolOutput::partial(
                combined,
                ToolError::deadline(Self::NAME, ctx.timeout()),
            ));
        }

        match output.exit_code {
            Some(0) if combined.is_empty() => Ok(ToolOutput::success(
                "[Command completed successfully with no output]",
            )),
            Some(0) => Ok(ToolOutput::success(combined)),
            Some(code) => Ok(ToolOutput::partial(
                combined,
                ToolError::execution(Self::NAME, format!("exit status {}", code)),
            )),
            None => Ok(ToolOutput::partial(
                combined,
                ToolError::execution(Self::NAME, "terminated by signal"),
            )),
        }
    }
}
