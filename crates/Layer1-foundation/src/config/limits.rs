//! Limits Configuration - resource, rate and timeout bounds
//!
//! Each section is consumed by a different part of the pipeline:
//! - [`LimitsConfig`]: filesystem tools (file size, walk depth, entry count)
//! - [`RateLimitConfig`]: the registry's rate limiter
//! - [`TimeoutConfig`]: the registry's deadline derivation
//! - [`OutputFilterConfig`]: display formatting only, never stored results

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default per-call timeout (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Resource limits
// ============================================================================

/// Numeric limits applied inside filesystem tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest file `cat` will read or `write_file` will produce
    pub max_file_size_bytes: u64,
    /// Deepest level `find` descends to
    pub max_directory_depth: usize,
    /// Most entries `ls`/`find` will report
    pub max_directory_entries: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 1024 * 1024, // 1 MiB
            max_directory_depth: 8,
            max_directory_entries: 1000,
        }
    }
}

// ============================================================================
// Rate limits
// ============================================================================

/// Per-tool call frequency bounds over a rolling 60 second window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Calls per minute for tools without an override (0 = unlimited)
    pub default_per_minute: u32,
    /// Per-tool calls per minute (0 = unlimited)
    pub per_tool: BTreeMap<String, u32>,
    /// Minimum seconds between two calls of the same tool
    pub cooldown_seconds: BTreeMap<String, u64>,
}

impl RateLimitConfig {
    /// Unlimited everywhere
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Effective per-minute limit, `None` when unlimited
    pub fn limit_for(&self, tool: &str) -> Option<u32> {
        let limit = self
            .per_tool
            .get(tool)
            .copied()
            .unwrap_or(self.default_per_minute);
        (limit > 0).then_some(limit)
    }

    /// Cooldown between calls, `None` when not configured
    pub fn cooldown_for(&self, tool: &str) -> Option<Duration> {
        self.cooldown_seconds
            .get(tool)
            .filter(|secs| **secs > 0)
            .map(|secs| Duration::from_secs(*secs))
    }

    pub fn with_tool_limit(mut self, tool: impl Into<String>, per_minute: u32) -> Self {
        self.per_tool.insert(tool.into(), per_minute);
        self
    }

    pub fn with_cooldown(mut self, tool: impl Into<String>, seconds: u64) -> Self {
        self.cooldown_seconds.insert(tool.into(), seconds);
        self
    }
}

// ============================================================================
// Timeouts
// ============================================================================

/// Wall-clock bound per call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub default_seconds: u64,
    pub per_tool: BTreeMap<String, u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_seconds: DEFAULT_TIMEOUT_SECS,
            per_tool: BTreeMap::new(),
        }
    }
}

impl TimeoutConfig {
    /// Per-tool override, else the default. Zero is taken literally: the
    /// deadline has already passed when the call begins.
    pub fn effective(&self, tool: &str) -> Duration {
        let secs = self
            .per_tool
            .get(tool)
            .copied()
            .unwrap_or(self.default_seconds);
        Duration::from_secs(secs)
    }

    pub fn with_tool_timeout(mut self, tool: impl Into<String>, seconds: u64) -> Self {
        self.per_tool.insert(tool.into(), seconds);
        self
    }
}

// ============================================================================
// Output filters
// ============================================================================

/// Filters applied to displayed results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFilterConfig {
    pub max_chars: usize,
    pub strip_ansi: bool,
    pub strip_control: bool,
}

impl Default for OutputFilterConfig {
    fn default() -> Self {
        Self {
            max_chars: 4000,
            strip_ansi: true,
            strip_control: true,
        }
    }
}
