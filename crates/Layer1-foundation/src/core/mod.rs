//! Core Module - tool interfaces and call types
//!
//! - `types.rs`: data types (ToolCall, ToolArgs, ToolResult ...)
//! - `traits.rs`: interfaces (Tool, ToolContext, CommandRunner, ApprovalDelegate)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Tool Registry                           │
//! │  ┌─────────────────┐                                        │
//! │  │  Builtin Tools  │                                        │
//! │  │  ├── shell      │                                        │
//! │  │  ├── ls / cat   │                                        │
//! │  │  └── write ...  │                                        │
//! │  └────────┬────────┘                                        │
//! │           ▼                                                 │
//! │  ┌────────────────┐   ┌──────────────┐   ┌──────────────┐   │
//! │  │ Policy Engine  │ → │ Rate Limiter │ → │  Deadline    │   │
//! │  └────────────────┘   └──────────────┘   └──────┬───────┘   │
//! │                                                 ▼           │
//! │                                   ┌─────────────────────┐   │
//! │                                   │ ToolContext         │   │
//! │                                   │ (sandbox, runner)   │   │
//! │                                   └─────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod traits;
pub mod types;

// ============================================================================
// Types (types.rs)
// ============================================================================

pub use types::{
    ApprovalRequest, ExecuteOptions, ToolArgs, ToolCall, ToolOutput, ToolResult, ToolSchema,
    MAX_ARGUMENT_BYTES,
};

// ============================================================================
// Traits (traits.rs)
// ============================================================================

pub use traits::{
    ApprovalDelegate, CommandOutput, CommandRunner, CommandSpec, Tool, ToolContext, ToolMeta,
};
