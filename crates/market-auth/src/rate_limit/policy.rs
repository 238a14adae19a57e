//! Sliding-window lockout policy and the decisions it produces.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use market_core::config::RateLimitConfig;

/// Attempt window length.
pub const DEFAULT_WINDOW_MINUTES: i64 = 15;
/// Failed attempts allowed per window.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Lockout length once the threshold is reached.
pub const DEFAULT_BLOCK_MINUTES: i64 = 30;

/// Window, threshold and lockout length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Length of the attempt window.
    pub window: Duration,
    /// Failed attempts allowed inside one window.
    pub max_attempts: u32,
    /// Lockout length.
    pub block_duration: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            window: Duration::minutes(DEFAULT_WINDOW_MINUTES),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            block_duration: Duration::minutes(DEFAULT_BLOCK_MINUTES),
        }
    }
}

impl RateLimitPolicy {
    /// Build the policy from configuration.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            window: Duration::minutes(config.window_minutes as i64),
            max_attempts: config.max_attempts,
            block_duration: Duration::minutes(config.block_minutes as i64),
        }
    }

    /// Whether a window that started at `window_start` has elapsed at `now`.
    pub fn window_expired(&self, window_start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - window_start > self.window
    }
}

/// Result of [`LoginRateLimiter::check`](super::LoginRateLimiter::check).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    /// Whether a login attempt may proceed.
    pub allowed: bool,
    /// Failed attempts left before lockout.
    pub remaining_attempts: u32,
    /// End of the running lockout, if any.
    pub blocked_until: Option<DateTime<Utc>>,
    /// Text for the login form. Empty when nothing needs saying.
    pub message: String,
}

impl RateLimitDecision {
    /// No attempts recorded, or the previous window/lockout has elapsed.
    pub fn open(policy: &RateLimitPolicy) -> Self {
        Self {
            allowed: true,
            remaining_attempts: policy.max_attempts,
            blocked_until: None,
            message: String::new(),
        }
    }

    /// A lockout is running until `until`.
    pub fn blocked(until: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let minutes = minutes_remaining(until, now);
        Self {
            allowed: false,
            remaining_attempts: 0,
            blocked_until: Some(until),
            message: format!(
                "Çok fazla başarısız giriş denemesi. Lütfen {minutes} dakika sonra tekrar deneyin."
            ),
        }
    }

    /// Some attempts consumed inside the current window.
    pub fn partial(remaining: u32) -> Self {
        Self {
            allowed: remaining > 0,
            remaining_attempts: remaining,
            blocked_until: None,
            message: format!("{remaining} giriş denemesi hakkınız kaldı."),
        }
    }
}

/// Whole minutes until `until`, rounded up.
pub fn minutes_remaining(until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (until - now).num_milliseconds().max(0);
    (millis + 59_999) / 60_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minutes_remaining_rounds_up() {
        let now = Utc::now();
        assert_eq!(minutes_remaining(now + Duration::minutes(30), now), 30);
        assert_eq!(minutes_remaining(now + Duration::seconds(61), now), 2);
        assert_eq!(minutes_remaining(now + Duration::milliseconds(1), now), 1);
        assert_eq!(minutes_remaining(now - Duration::seconds(5), now), 0);
    }

    #[test]
    fn test_blocked_message_mentions_minutes() {
        let now = Utc::now();
        let decision = RateLimitDecision::blocked(now + Duration::minutes(12), now);
        assert!(!decision.allowed);
        assert!(decision.message.contains("12 dakika"));
    }

    #[test]
    fn test_policy_from_config() {
        let config = RateLimitConfig {
            window_minutes: 10,
            max_attempts: 3,
            block_minutes: 60,
            ..RateLimitConfig::default()
        };
        let policy = RateLimitPolicy::from_config(&config);
        assert_eq!(policy.window, Duration::minutes(10));
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.block_duration, Duration::hours(1));
        assert_eq!(RateLimitPolicy::from_config(&RateLimitConfig::default()), RateLimitPolicy::default());
    }
}
