//! Toolgate Config - the complete policy file
//!
//! Discovery order mirrors the usual project/global split:
//! 1. `<root>/.toolgate/config.toml`
//! 2. `<config_dir>/toolgate/config.toml`
//! 3. built-in defaults

use crate::permission::Policy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{LimitsConfig, OutputFilterConfig, RateLimitConfig, TimeoutConfig};

/// Config file name
pub const CONFIG_FILE: &str = "config.toml";

/// Project-local config directory name
pub const PROJECT_DIR: &str = ".toolgate";

/// Toolgate configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolgateConfig {
    /// allow / ask / deny / require_confirmation name sets
    pub policy: Policy,

    /// File size and directory walk limits
    pub limits: LimitsConfig,

    /// Per-tool call frequency
    pub rate_limits: RateLimitConfig,

    /// Per-tool wall-clock bounds
    pub timeouts: TimeoutConfig,

    /// Display filters
    pub output: OutputFilterConfig,
}

impl ToolgateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// Load from an explicit file. `.json` files are parsed as JSON,
    /// anything else as TOML.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let config: Self = if is_json(path) {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };

        config.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Project file first, then the global file, else defaults
    pub fn discover(root: &Path) -> Result<Self> {
        for candidate in Self::candidates(root) {
            if candidate.is_file() {
                return Self::load_from(&candidate);
            }
        }
        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Files checked by [`discover`](Self::discover), in order
    pub fn candidates(root: &Path) -> Vec<PathBuf> {
        let mut paths = vec![root.join(PROJECT_DIR).join(CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("toolgate").join(CONFIG_FILE));
        }
        paths
    }

    /// Save as pretty TOML, or JSON for `.json` paths
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Config(format!("Failed to create directory: {}", e))
                })?;
            }
        }

        let content = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            toml::to_string_pretty(self)?
        };

        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write {}: {}", path.display(), e)))
    }

    // ========================================================================
    // Validation
    // ========================================================================

    pub fn validate(&self) -> Result<()> {
        if self.output.max_chars == 0 {
            return Err(Error::Config("output.max_chars must be positive".into()));
        }
        if self.limits.max_directory_depth == 0 {
            return Err(Error::Config(
                "limits.max_directory_depth must be positive".into(),
            ));
        }
        if self.limits.max_directory_entries == 0 {
            return Err(Error::Config(
                "limits.max_directory_entries must be positive".into(),
            ));
        }

        for name in self.policy.allow.intersection(&self.policy.deny) {
            warn!("Tool '{}' is listed in both allow and deny; deny wins", name);
        }

        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[policy]
allow = ["ls"]
ask = ["cat"]
deny = ["execute_shell_command"]

[limits]
max_file_size_bytes = 2048

[rate_limits]
default_per_minute = 60
per_tool = { cat = 1 }
cooldown_seconds = { cat = 5 }

[timeouts]
default_seconds = 10
per_tool = { find = 0 }

[output]
max_chars = 80
strip_ansi = false
"#;

    #[test]
    fn test_parse_toml() {
        let config: ToolgateConfig = toml::from_str(SAMPLE).unwrap();

        assert!(config.policy.allow.contains("ls"));
        assert!(config.policy.deny.contains("execute_shell_command"));
        assert_eq!(config.limits.max_file_size_bytes, 2048);
        // untouched keys keep their defaults
        assert_eq!(config.limits.max_directory_entries, 1000);
        assert_eq!(config.rate_limits.limit_for("cat"), Some(1));
        assert_eq!(config.rate_limits.limit_for("ls"), Some(60));
        assert!(config.timeouts.effective("find").is_zero());
        assert_eq!(config.output.max_chars, 80);
        assert!(!config.output.strip_ansi);
        assert!(config.output.strip_control);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let config: ToolgateConfig = toml::from_str(SAMPLE).unwrap();

        let toml_path = dir.path().join("nested").join("config.toml");
        config.save_to(&toml_path).unwrap();
        assert_eq!(ToolgateConfig::load_from(&toml_path).unwrap(), config);

        let json_path = dir.path().join("config.json");
        config.save_to(&json_path).unwrap();
        assert_eq!(ToolgateConfig::load_from(&json_path).unwrap(), config);
    }

    #[test]
    fn test_discover_project_file() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join(PROJECT_DIR);
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join(CONFIG_FILE), SAMPLE).unwrap();

        let config = ToolgateConfig::discover(dir.path()).unwrap();
        assert!(config.policy.ask.contains("cat"));
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = ToolgateConfig::default();
        assert!(config.validate().is_ok());

        config.output.max_chars = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_reports_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[policy\nallow = 3").unwrap();
        assert!(ToolgateConfig::load_from(&path).is_err());
    }
}
