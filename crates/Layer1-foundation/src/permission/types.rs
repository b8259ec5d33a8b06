//! Permission types
//!
//! The policy file names tools in four sets; at registry construction each
//! registered tool gets a [`Permission`] derived from them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Four name-set policy as written in the config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Run without asking
    pub allow: BTreeSet<String>,
    /// Ask before running (also the default for unlisted tools)
    pub ask: BTreeSet<String>,
    /// Never run
    pub deny: BTreeSet<String>,
    /// Ask every time, even when allowed
    pub require_confirmation: BTreeSet<String>,
}

impl Policy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, name: impl Into<String>) -> Self {
        self.allow.insert(name.into());
        self
    }

    pub fn ask(mut self, name: impl Into<String>) -> Self {
        self.ask.insert(name.into());
        self
    }

    pub fn deny(mut self, name: impl Into<String>) -> Self {
        self.deny.insert(name.into());
        self
    }

    pub fn require_confirmation(mut self, name: impl Into<String>) -> Self {
        self.require_confirmation.insert(name.into());
        self
    }

    /// Classify a name: Deny > Allow > Ask > default(Ask)
    pub fn classify(&self, name: &str) -> PolicyClass {
        if self.deny.contains(name) {
            PolicyClass::Deny
        } else if self.allow.contains(name) {
            PolicyClass::Allow
        } else {
            PolicyClass::Ask
        }
    }

    /// Initial permission for a tool name
    pub fn permission_for(&self, name: &str) -> Permission {
        Permission {
            allowed: self.classify(name) == PolicyClass::Allow,
            require_confirmation: self.require_confirmation.contains(name),
        }
    }
}

/// Policy class of a tool name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyClass {
    Allow,
    Ask,
    Deny,
}

/// Mutable per-tool permission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub allowed: bool,
    pub require_confirmation: bool,
}

impl Permission {
    /// Runs without an approval step
    pub fn is_unattended(&self) -> bool {
        self.allowed && !self.require_confirmation
    }
}

/// Why a call needs out-of-band approval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalReason {
    /// Tool is in `ask` (or unlisted) and has not been allowed yet
    NotYetAllowed,
    /// Tool carries the require-confirmation flag
    ConfirmationRequired,
}

impl ApprovalReason {
    pub fn description(&self) -> &'static str {
        match self {
            ApprovalReason::NotYetAllowed => "tool has not been allowed in this session",
            ApprovalReason::ConfirmationRequired => "tool requires confirmation for every call",
        }
    }
}

/// Outcome of the permission gate for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Authorized,
    NeedsApproval(ApprovalReason),
    Denied,
}

/// Answer from an approval prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalResponse {
    /// Run this call only
    AllowOnce,
    /// Run now and stop asking for this tool for the rest of the session
    AlwaysAllow,
    /// Refuse this call
    Deny,
}

impl ApprovalResponse {
    /// Parse from user input
    pub fn from_input(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "y" | "yes" | "1" => Some(Self::AllowOnce),
            "a" | "always" | "2" => Some(Self::AlwaysAllow),
            "n" | "no" | "deny" | "0" => Some(Self::Deny),
            _ => None,
        }
    }

    pub fn is_allow(&self) -> bool {
        !matches!(self, Self::Deny)
    }
}
