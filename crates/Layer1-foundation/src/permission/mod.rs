//! Permission system for Toolgate
//!
//! - `types`: policy name sets, per-tool permission, decisions
//! - `engine`: runtime permission table (PolicyEngine)
//!
//! ## Usage
//!
//! ```rust,ignore
//! let policy = Policy::new().allow("ls").ask("cat").deny("execute_shell_command");
//! let engine = PolicyEngine::new(&policy, ["ls", "cat", "execute_shell_command"]);
//!
//! match engine.decide("cat", &ExecuteOptions::default()) {
//!     Decision::Authorized => { /* run */ }
//!     Decision::NeedsApproval(reason) => { /* prompt */ }
//!     Decision::Denied => { /* block */ }
//! }
//! ```

mod engine;
mod types;

pub use engine::PolicyEngine;
pub use types::{
    ApprovalReason, ApprovalResponse, Decision, Permission, Policy, PolicyClass,
};
