//! # toolgate-tool
//!
//! Tool execution layer for Toolgate:
//! - Registry: one gated `execute` entry point (policy, rate limit, deadline)
//! - Sandbox: path confinement that survives symlink indirection
//! - Limiter: per-tool sliding-window rate limits and timeouts
//! - Builtin tools: shell, filesystem and system tools
//! - Runner: host process execution with cancellation
//! - Format: terminal rendering of results

pub mod builtin;
pub mod context;
pub mod format;
pub mod limiter;
pub mod registry;
pub mod runner;
pub mod sandbox;

pub use context::RuntimeContext;
pub use format::{format_block, format_inline, OutputFilter, INLINE_PREVIEW_CHARS};
pub use limiter::{RateLimitStats, RateLimiter, TimeoutPolicy, RATE_WINDOW};
pub use registry::{
    BatchStats, ToolRegistry, ToolRegistryBuilder, CANCEL_GRACE, DEFAULT_MAX_CONCURRENCY,
};
pub use runner::HostRunner;
pub use sandbox::Sandbox;

// Re-export builtin tools
pub use builtin::{
    CatTool, FindTool, LsTool, MkdirTool, MvTool, PwdTool, ReadlinkTool, RmTool, ShellTool,
    StatTool, SystemInfoTool, TouchTool, WhichTool, WriteFileTool,
};
