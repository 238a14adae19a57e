//! Change-feed and notification buffer configuration.

use serde::{Deserialize, Serialize};

/// Realtime change-feed and notification store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Heartbeat interval for the realtime socket in seconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// How long to wait for a join reply before reporting a timeout.
    #[serde(default = "default_join_timeout")]
    pub join_timeout_seconds: u64,
    /// Reconnect backoff settings.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Maximum notifications retained per store.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Window in which a repeated insert for the same record is dropped.
    #[serde(default = "default_dedup_window")]
    pub dedup_window_ms: u64,
    /// Upper bound on the order-number lookup for chat notifications.
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_ms: u64,
    /// Buffer size for the outbound command and toast broadcast channels.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: default_heartbeat_interval(),
            join_timeout_seconds: default_join_timeout(),
            reconnect: ReconnectConfig::default(),
            buffer_capacity: default_buffer_capacity(),
            dedup_window_ms: default_dedup_window(),
            lookup_timeout_ms: default_lookup_timeout(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Exponential reconnect backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt, doubled per attempt.
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    /// Hard cap on the computed delay.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Add random jitter to each delay.
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            jitter: true,
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_join_timeout() -> u64 {
    10
}

fn default_buffer_capacity() -> usize {
    50
}

fn default_dedup_window() -> u64 {
    2000
}

fn default_lookup_timeout() -> u64 {
    5000
}

fn default_event_buffer() -> usize {
    256
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}
