//! # toolgate-foundation
//!
//! Foundation layer for Toolgate:
//! - Core: tool traits and call types (Tool, ToolContext, CommandRunner)
//! - Permission: allow / ask / deny policy and the runtime policy engine
//! - Config: policy file, limits, rate limits, timeouts, output filters
//! - Error: crate errors and the per-call `ToolError` taxonomy
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Tool Registry (Layer2)                                 │
//! │  └── Builtin Tools (shell, ls, cat, write_file ...)     │
//! │                     │                                   │
//! │                     ▼                                   │
//! │          Policy Engine (Allow/Ask/Deny)                 │
//! │                     │                                   │
//! │          ┌──────────┴──────────┐                        │
//! │          ▼                     ▼                        │
//! │   Rate Limiter          Deadline / Cancellation         │
//! │                     │                                   │
//! │                     ▼                                   │
//! │      Path Sandbox + CommandRunner                       │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod permission;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result, ToolError};

// ============================================================================
// Core
// ============================================================================
pub use core::{
    // Types (types.rs)
    ApprovalRequest,
    ExecuteOptions,
    ToolArgs,
    ToolCall,
    ToolOutput,
    ToolResult,
    ToolSchema,
    MAX_ARGUMENT_BYTES,
    // Traits (traits.rs)
    ApprovalDelegate,
    CommandOutput,
    CommandRunner,
    CommandSpec,
    Tool,
    ToolContext,
    ToolMeta,
};

// ============================================================================
// Permission
// ============================================================================
pub use permission::{
    ApprovalReason, ApprovalResponse, Decision, Permission, Policy, PolicyClass, PolicyEngine,
};

// ============================================================================
// Config
// ============================================================================
pub use config::{
    LimitsConfig, OutputFilterConfig, RateLimitConfig, TimeoutConfig, ToolgateConfig,
    DEFAULT_TIMEOUT_SECS,
};

// Re-exported so tool crates name one version of each
pub use semver;
pub use tokio_util::sync::CancellationToken;
