//! Config - policy file and limit sections
//!
//! - `limits.rs` - resource, rate, timeout and output limits
//! - `settings.rs` - ToolgateConfig (the whole file)

mod limits;
mod settings;

pub use limits::{
    LimitsConfig, OutputFilterConfig, RateLimitConfig, TimeoutConfig, DEFAULT_TIMEOUT_SECS,
};
pub use settings::{ToolgateConfig, CONFIG_FILE, PROJECT_DIR};
