//! Reconnect delay policy: exponential backoff with capped jitter.

use std::time::Duration;

use rand::RngExt;

use market_core::config::ReconnectConfig;

/// Computes the wait before each reconnect attempt.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first retry. Actual delay = base * 2^attempt + jitter.
    pub base_delay: Duration,
    /// Hard cap on any delay.
    pub max_delay: Duration,
    /// Adds random jitter of [0, base_delay/2).
    pub jitter: bool,
}

impl ReconnectPolicy {
    /// Build from configuration.
    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms.max(config.base_delay_ms)),
            jitter: config.jitter,
        }
    }

    /// Delay for a 0-indexed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // Shifts of 32 or more saturate instead of overflowing.
        let multiplier = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let capped = self
            .base_delay
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        if !self.jitter {
            return capped;
        }

        let jitter_range_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX) / 2;
        let headroom_ms =
            u64::try_from(self.max_delay.saturating_sub(capped).as_millis()).unwrap_or(0);
        let limit_ms = jitter_range_ms.min(headroom_ms);
        if limit_ms == 0 {
            return capped;
        }

        let jitter_ms = rand::rng().random_range(0..limit_ms);
        (capped + Duration::from_millis(jitter_ms)).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter: bool) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            jitter,
        }
    }

    #[test]
    fn test_exponential_growth_without_jitter() {
        let p = policy(false);
        assert_eq!(p.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(p.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(p.delay_for_attempt(3), Duration::from_millis(8000));
        assert_eq!(p.delay_for_attempt(10), Duration::from_millis(30_000));
        assert_eq!(p.delay_for_attempt(64), Duration::from_millis(30_000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let p = policy(true);
        for attempt in 0..8 {
            let d = p.delay_for_attempt(attempt);
            let floor = policy(false).delay_for_attempt(attempt);
            assert!(d >= floor);
            assert!(d <= p.max_delay);
            assert!(d < floor + Duration::from_millis(500) || d == p.max_delay);
        }
    }

    #[test]
    fn test_from_config_keeps_cap_above_base() {
        let p = ReconnectPolicy::from_config(&ReconnectConfig {
            base_delay_ms: 5000,
            max_delay_ms: 100,
            jitter: false,
        });
        assert_eq!(p.max_delay, Duration::from_millis(5000));
    }
}
