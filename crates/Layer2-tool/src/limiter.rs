//! Rate Limiter & Timeouts
//!
//! Both are plain data owned by the registry's gate state; the registry lock
//! serializes every check, so nothing here synchronizes on its own.
//!
//! Rate check for one tool:
//! 1. prune timestamps older than [`RATE_WINDOW`]
//! 2. reject when the per-minute limit is reached (not recorded)
//! 3. reject when the cooldown has not elapsed (not recorded)
//! 4. record the call

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use toolgate_foundation::{RateLimitConfig, TimeoutConfig, ToolError};

/// Rolling window for per-minute limits
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Stand-in deadline for timeouts too large to add to an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

// ============================================================================
// RateLimiter
// ============================================================================

#[derive(Debug, Default)]
struct CallHistory {
    calls: VecDeque<Instant>,
    last_call: Option<Instant>,
}

impl CallHistory {
    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.calls.front() {
            if now.saturating_duration_since(oldest) >= RATE_WINDOW {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Snapshot counters for logs and the CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitStats {
    pub tracked_tools: usize,
    pub throttle_events_total: u64,
}

/// Per-tool sliding-window rate limiter
#[derive(Debug, Default)]
pub struct RateLimiter {
    config: RateLimitConfig,
    histories: HashMap<String, CallHistory>,
    throttle_events_total: u64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            histories: HashMap::new(),
            throttle_events_total: 0,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Replace the limits; existing call histories are kept.
    pub fn reconfigure(&mut self, config: RateLimitConfig) {
        self.config = config;
    }

    pub fn check(&mut self, tool: &str) -> Result<(), ToolError> {
        self.check_at(tool, Instant::now())
    }

    /// Check and record a call made at `now`
    pub fn check_at(&mut self, tool: &str, now: Instant) -> Result<(), ToolError> {
        let limit = self.config.limit_for(tool);
        let cooldown = self.config.cooldown_for(tool);

        let history = self.histories.entry(tool.to_string()).or_default();
        history.prune(now);

        if let Some(limit) = limit {
            if history.calls.len() >= limit as usize {
                let retry_after = history
                    .calls
                    .front()
                    .map(|oldest| RATE_WINDOW.saturating_sub(now.saturating_duration_since(*oldest)))
                    .unwrap_or(RATE_WINDOW);
                return Err(self.throttled(tool, retry_after));
            }
        }

        if let (Some(cooldown), Some(last)) = (cooldown, history.last_call) {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < cooldown {
                return Err(self.throttled(tool, cooldown - elapsed));
            }
        }

        history.calls.push_back(now);
        history.last_call = Some(now);
        Ok(())
    }

    /// Calls currently counted in the window
    pub fn recent_calls(&self, tool: &str, now: Instant) -> usize {
        self.histories
            .get(tool)
            .map(|h| {
                h.calls
                    .iter()
                    .filter(|t| now.saturating_duration_since(**t) < RATE_WINDOW)
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn stats(&self) -> RateLimitStats {
        RateLimitStats {
            tracked_tools: self.histories.len(),
            throttle_events_total: self.throttle_events_total,
        }
    }

    fn throttled(&mut self, tool: &str, retry_after: Duration) -> ToolError {
        self.throttle_events_total = self.throttle_events_total.saturating_add(1);
        ToolError::RateLimited {
            tool: tool.to_string(),
            retry_after_secs: ceil_secs(retry_after),
        }
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

// ============================================================================
// TimeoutPolicy
// ============================================================================

/// Per-tool wall-clock bounds
#[derive(Debug, Clone, Default)]
pub struct TimeoutPolicy {
    config: TimeoutConfig,
}

impl TimeoutPolicy {
    pub fn new(config: TimeoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TimeoutConfig {
        &self.config
    }

    pub fn reconfigure(&mut self, config: TimeoutConfig) {
        self.config = config;
    }

    pub fn effective(&self, tool: &str) -> Duration {
        self.config.effective(tool)
    }

    /// Effective timeout and the deadline it gives for a call starting at `start`
    pub fn deadline_for(&self, tool: &str, start: Instant) -> (Duration, Instant) {
        let timeout = self.effective(tool);
        let deadline = start
            .checked_add(timeout)
            .unwrap_or_else(|| start + FAR_FUTURE);
        (timeout, deadline)
    }
}
