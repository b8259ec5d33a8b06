//! Builtin Tools
//!
//! ## Tool list
//!
//! ### Execute
//! - `execute_shell_command` - run a shell command through the context's runner
//!
//! ### Filesystem (read)
//! - `ls` - list a directory
//! - `cat` - read a file
//! - `stat` - file metadata
//! - `readlink` - symlink target
//! - `find` - depth-limited walk with a glob filter
//!
//! ### Filesystem (write)
//! - `write_file` - write or append
//! - `touch` - create or bump mtime
//! - `mkdir` - create a directory
//! - `rm` - remove a file or tree
//! - `mv` - rename inside the sandbox
//!
//! ### System
//! - `pwd` - sandbox root
//! - `system_info` - OS, arch, host, CPUs, local time
//! - `which` - locate an executable
//!
//! Every path argument goes through [`crate::sandbox`] and every tool calls
//! `ctx.checkpoint()` at entry and inside its loops. File contents are read and
//! written with `tokio::fs`, and only regular files are opened.

pub mod fs_read;
pub mod fs_write;
pub mod shell;
pub mod system;

pub use fs_read::{CatTool, FindTool, LsTool, ReadlinkTool, StatTool};
pub use fs_write::{MkdirTool, MvTool, RmTool, TouchTool, WriteFileTool};
pub use shell::ShellTool;
pub use system::{PwdTool, SystemInfoTool, WhichTool};

use crate::sandbox;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use toolgate_foundation::{Tool, ToolContext, ToolError};

/// Create every builtin tool
pub fn all_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        // Execute
        Arc::new(ShellTool::new()) as Arc<dyn Tool>,
        // Filesystem (read)
        Arc::new(LsTool::new()),
        Arc::new(CatTool::new()),
        Arc::new(StatTool::new()),
        Arc::new(ReadlinkTool::new()),
        Arc::new(FindTool::new()),
        // Filesystem (write)
        Arc::new(WriteFileTool::new()),
        Arc::new(TouchTool::new()),
        Arc::new(MkdirTool::new()),
        Arc::new(RmTool::new()),
        Arc::new(MvTool::new()),
        // System
        Arc::new(PwdTool::new()),
        Arc::new(SystemInfoTool::new()),
        Arc::new(WhichTool::new()),
    ]
}

/// Builtin tool names
pub fn names() -> Vec<&'static str> {
    vec![
        ShellTool::NAME,
        LsTool::NAME,
        CatTool::NAME,
        StatTool::NAME,
        ReadlinkTool::NAME,
        FindTool::NAME,
        WriteFileTool::NAME,
        TouchTool::NAME,
        MkdirTool::NAME,
        RmTool::NAME,
        MvTool::NAME,
        PwdTool::NAME,
        SystemInfoTool::NAME,
        WhichTool::NAME,
    ]
}

// ============================================================================
// Shared helpers
// ============================================================================

fn resolve_path(ctx: &dyn ToolContext, candidate: &str) -> Result<PathBuf, ToolError> {
    sandbox::resolve(candidate, ctx.sandbox_root())
}

fn resolve_link(ctx: &dyn ToolContext, candidate: &str) -> Result<PathBuf, ToolError> {
    sandbox::resolve_no_follow(candidate, ctx.sandbox_root())
}

/// Path relative to the sandbox root for output
fn display_path(ctx: &dyn ToolContext, path: &Path) -> String {
    match path.strip_prefix(ctx.sandbox_root()) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.display().to_string(),
        Err(_) => path.display().to_string(),
    }
}

/// OS failure wrapped with the tool name and the sandbox-relative path
fn io_error(ctx: &dyn ToolContext, path: &Path, err: std::io::Error) -> ToolError {
    ToolError::execution(
        ctx.tool_name(),
        format!("{}: {}", display_path(ctx, path), err),
    )
}

fn not_regular_file(ctx: &dyn ToolContext, path: &Path) -> ToolError {
    ToolError::execution(
        ctx.tool_name(),
        format!("{}: not a regular file", display_path(ctx, path)),
    )
}

/// Open through tokio's blocking pool and keep the handle only if it is a
/// regular file. `O_NONBLOCK` keeps FIFOs from parking the open.
async fn open_regular(
    ctx: &dyn ToolContext,
    path: &Path,
    options: &mut tokio::fs::OpenOptions,
) -> Result<tokio::fs::File, ToolError> {
    #[cfg(unix)]
    options.custom_flags(libc::O_NONBLOCK);

    let file = options.open(path).await.map_err(|e| io_error(ctx, path, e))?;
    let meta = file.metadata().await.map_err(|e| io_error(ctx, path, e))?;
    if !meta.is_file() {
        return Err(not_regular_file(ctx, path));
    }
    Ok(file)
}
