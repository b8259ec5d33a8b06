//! Non-interactive commands: registry setup, `tools`, `run`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use toolgate_foundation::{ApprovalDelegate, ExecuteOptions, ToolCall, ToolResult, ToolgateConfig};
use toolgate_tool::{format_block, OutputFilter, ToolRegistry};

use crate::prompt::{AutoApprove, TerminalApproval};

/// Config from `--config`, else discovered from the sandbox root
pub fn load_config(root: &Path, explicit: Option<&Path>) -> Result<ToolgateConfig> {
    match explicit {
        Some(path) => ToolgateConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display())),
        None => ToolgateConfig::discover(root).context("discovering config"),
    }
}

pub fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(root) => Ok(root),
        None => std::env::current_dir().context("reading current directory"),
    }
}

pub fn build_registry(root: &Path, config: &ToolgateConfig) -> Result<ToolRegistry> {
    ToolRegistry::builder()
        .sandbox_root(root)
        .config(config)
        .with_builtins()
        .build()
        .context("building tool registry")
}

/// Fresh call id
pub fn call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

/// `toolgate tools`
pub fn list_tools(registry: &ToolRegistry) {
    println!("\nSandbox: {}\n", registry.sandbox_root().display());
    println!(
        "{:<24} {:<12} {:<8} {:<8} {:<8}",
        "Tool", "Category", "Allowed", "Confirm", "Timeout"
    );
    println!("{}", "-".repeat(64));

    for name in registry.tool_names() {
        let category = registry
            .get(&name)
            .map(|tool| tool.meta().category)
            .unwrap_or_default();
        let permission = registry.get_permission(&name).unwrap_or_default();
        let allowed = if registry.is_denied(&name) {
            "denied"
        } else if permission.allowed {
            "yes"
        } else {
            "ask"
        };
        let confirm = if permission.require_confirmation { "yes" } else { "-" };

        println!(
            "{:<24} {:<12} {:<8} {:<8} {:<8}",
            name,
            category,
            allowed,
            confirm,
            format!("{}s", registry.effective_timeout(&name).as_secs())
        );
    }
    println!();
}

/// `toolgate run`. Returns whether the call succeeded.
pub async fn run_once(
    registry: &ToolRegistry,
    filter: &OutputFilter,
    tool: &str,
    args: &str,
    force: bool,
    yes: bool,
) -> Result<bool> {
    let call = ToolCall::new(call_id(), tool, args);

    let execution = async {
        if force {
            registry
                .execute_tool_call(&call, ExecuteOptions::forced())
                .await
        } else {
            let delegate: &dyn ApprovalDelegate = if yes { &AutoApprove } else { &TerminalApproval };
            registry.execute_with_approval(&call, delegate).await
        }
    };

    let result: ToolResult = tokio::select! {
        result = execution => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nInterrupted");
            return Ok(false);
        }
    };

    println!("{}", format_block(&result, filter));
    Ok(result.is_success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_from_discovered_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(toolgate_foundation::config::PROJECT_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join(toolgate_foundation::config::CONFIG_FILE),
            "[policy]\nallow = [\"ls\"]\ndeny = [\"rm\"]\n\n[timeouts]\ndefault_seconds = 7\n",
        )
        .unwrap();

        let config = load_config(dir.path(), None).unwrap();
        let registry = build_registry(dir.path(), &config).unwrap();

        assert!(registry.get_permission("ls").unwrap().allowed);
        assert!(registry.is_denied("rm"));
        assert!(!registry.get_permission("cat").unwrap().allowed);
        assert_eq!(registry.effective_timeout("cat").as_secs(), 7);
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(dir.path(), Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_call_ids_are_unique() {
        let a = call_id();
        assert!(a.starts_with("call_"));
        assert_ne!(a, call_id());
    }
}
