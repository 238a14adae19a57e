//! Login protection configuration.

use serde::{Deserialize, Serialize};

/// Authentication-side configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Failed-login rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Sliding-window lockout policy for failed logins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Length of the attempt window in minutes.
    #[serde(default = "default_window")]
    pub window_minutes: u64,
    /// Failed attempts allowed inside one window.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Lockout duration in minutes once the threshold is reached.
    #[serde(default = "default_block")]
    pub block_minutes: u64,
    /// Backing store for attempt entries.
    #[serde(default)]
    pub store: RateLimitStoreKind,
    /// Redis URL, used when `store = "redis"`.
    #[serde(default)]
    pub redis_url: Option<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_window(),
            max_attempts: default_max_attempts(),
            block_minutes: default_block(),
            store: RateLimitStoreKind::default(),
            redis_url: None,
        }
    }
}

/// Which store holds rate-limit entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitStoreKind {
    /// Process-local map.
    #[default]
    Memory,
    /// Shared Redis instance.
    Redis,
}

fn default_window() -> u64 {
    15
}

fn default_max_attempts() -> u32 {
    5
}

fn default_block() -> u64 {
    30
}
