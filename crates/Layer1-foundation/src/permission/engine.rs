//! Permission policy engine
//!
//! Turns the per-tool [`Permission`] table into an execute/block decision.
//! The table is plain data: the registry owns it behind its single lock, so
//! every mutation and every decision goes through one choke point.

use super::types::{ApprovalReason, Decision, Permission, Policy};
use crate::core::ExecuteOptions;
use crate::ToolError;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Per-tool permissions plus the immutable deny set
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    permissions: BTreeMap<String, Permission>,
    denied: BTreeSet<String>,
}

impl PolicyEngine {
    /// Derive permissions for every registered tool name
    pub fn new<'a>(policy: &Policy, tool_names: impl IntoIterator<Item = &'a str>) -> Self {
        let permissions = tool_names
            .into_iter()
            .map(|name| (name.to_string(), policy.permission_for(name)))
            .collect();

        Self {
            permissions,
            denied: policy.deny.clone(),
        }
    }

    /// Decide whether a call may run.
    ///
    /// `force` satisfies the approval step for this call only; it never
    /// overrides the deny set.
    pub fn decide(&self, name: &str, options: &ExecuteOptions) -> Decision {
        if self.denied.contains(name) {
            return Decision::Denied;
        }

        let permission = self.permissions.get(name).copied().unwrap_or_default();
        if permission.is_unattended() || options.force {
            return Decision::Authorized;
        }

        if permission.allowed {
            Decision::NeedsApproval(ApprovalReason::ConfirmationRequired)
        } else {
            Decision::NeedsApproval(ApprovalReason::NotYetAllowed)
        }
    }

    pub fn is_denied(&self, name: &str) -> bool {
        self.denied.contains(name)
    }

    pub fn get(&self, name: &str) -> Option<Permission> {
        self.permissions.get(name).copied()
    }

    /// All permissions, sorted by tool name
    pub fn snapshot(&self) -> Vec<(String, Permission)> {
        self.permissions
            .iter()
            .map(|(name, perm)| (name.clone(), *perm))
            .collect()
    }

    pub fn set_allowed(&mut self, name: &str, allowed: bool) -> Result<(), ToolError> {
        let permission = self.entry(name)?;
        permission.allowed = allowed;
        info!(tool = name, allowed, "Permission updated");
        Ok(())
    }

    pub fn set_require_confirmation(&mut self, name: &str, required: bool) -> Result<(), ToolError> {
        let permission = self.entry(name)?;
        permission.require_confirmation = required;
        info!(tool = name, require_confirmation = required, "Permission updated");
        Ok(())
    }

    /// Allow a tool. With `always` the confirmation flag is cleared too, so
    /// later calls in this session skip the approval step entirely.
    pub fn allow(&mut self, name: &str, always: bool) -> Result<(), ToolError> {
        let permission = self.entry(name)?;
        permission.allowed = true;
        if always {
            permission.require_confirmation = false;
        }
        info!(tool = name, always, "Tool allowed");
        Ok(())
    }

    fn entry(&mut self, name: &str) -> Result<&mut Permission, ToolError> {
        self.permissions
            .get_mut(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOOLS: &[&str] = &["ls", "cat", "execute_shell_command", "write_file", "pwd"];

    fn engine() -> PolicyEngine {
        let policy = Policy::new()
            .allow("ls")
            .ask("cat")
            .deny("execute_shell_command")
            .allow("write_file")
            .require_confirmation("write_file");
        PolicyEngine::new(&policy, TOOLS.iter().copied())
    }

    #[test]
    fn test_decisions() {
        let engine = engine();
        let plain = ExecuteOptions::default();

        assert_eq!(engine.decide("ls", &plain), Decision::Authorized);
        assert_eq!(
            engine.decide("cat", &plain),
            Decision::NeedsApproval(ApprovalReason::NotYetAllowed)
        );
        assert_eq!(
            engine.decide("write_file", &plain),
            Decision::NeedsApproval(ApprovalReason::ConfirmationRequired)
        );
        assert_eq!(engine.decide("execute_shell_command", &plain), Decision::Denied);
        // unlisted tools default to ask
        assert_eq!(
            engine.decide("pwd", &plain),
            Decision::NeedsApproval(ApprovalReason::NotYetAllowed)
        );
    }

    #[test]
    fn test_force_never_overrides_deny() {
        let mut engine = engine();
        let forced = ExecuteOptions::forced();

        assert_eq!(engine.decide("cat", &forced), Decision::Authorized);
        assert_eq!(engine.decide("execute_shell_command", &forced), Decision::Denied);

        engine.allow("execute_shell_command", true).unwrap();
        engine.set_require_confirmation("execute_shell_command", false).unwrap();
        assert_eq!(engine.decide("execute_shell_command", &forced), Decision::Denied);
        assert!(engine.is_denied("execute_shell_command"));
    }

    #[test]
    fn test_always_allow_clears_confirmation() {
        let mut engine = engine();
        let plain = ExecuteOptions::default();

        engine.allow("write_file", false).unwrap();
        assert_eq!(
            engine.decide("write_file", &plain),
            Decision::NeedsApproval(ApprovalReason::ConfirmationRequired)
        );

        engine.allow("write_file", true).unwrap();
        assert_eq!(engine.decide("write_file", &plain), Decision::Authorized);
        assert_eq!(
            engine.get("write_file"),
            Some(Permission {
                allowed: true,
                require_confirmation: false
            })
        );
    }

    #[test]
    fn test_toggles() {
        let mut engine = engine();
        let plain = ExecuteOptions::default();

        engine.set_allowed("ls", false).unwrap();
        assert_eq!(
            engine.decide("ls", &plain),
            Decision::NeedsApproval(ApprovalReason::NotYetAllowed)
        );

        engine.set_allowed("cat", true).unwrap();
        assert_eq!(engine.decide("cat", &plain), Decision::Authorized);

        engine.set_require_confirmation("cat", true).unwrap();
        assert_eq!(
            engine.decide("cat", &plain),
            Decision::NeedsApproval(ApprovalReason::ConfirmationRequired)
        );
    }

    #[test]
    fn test_unknown_tool_mutation() {
        let mut engine = engine();
        assert_eq!(
            engine.set_allowed("nope", true),
            Err(ToolError::NotFound("nope".into()))
        );
        assert!(engine.get("nope").is_none());
        assert_eq!(engine.snapshot().len(), TOOLS.len());
    }
}
