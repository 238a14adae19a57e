//! Failed-login limiter: sliding window plus temporary lockout.
//!
//! Decision order for [`LoginRateLimiter::check_at`]:
//! 1. Running lockout → rejected with a countdown
//! 2. No entry, or lockout elapsed → fully open (stale entry removed)
//! 3. Window elapsed → fully open (entry removed)
//! 4. Otherwise → `max_attempts - count` attempts left

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use market_core::error::AppError;

use super::policy::{RateLimitDecision, RateLimitPolicy};
use super::store::{RateLimitEntry, RateLimitStore};

/// Per-identifier failed-login limiter.
///
/// Identifiers are used exactly as given: no trimming, no case folding.
#[derive(Debug, Clone)]
pub struct LoginRateLimiter {
    /// Entry storage.
    store: Arc<dyn RateLimitStore>,
    /// Window, threshold and lockout length.
    policy: RateLimitPolicy,
}

impl LoginRateLimiter {
    /// Creates a limiter over `store`.
    pub fn new(store: Arc<dyn RateLimitStore>, policy: RateLimitPolicy) -> Self {
        Self { store, policy }
    }

    /// The active policy.
    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Checks whether `identifier` may attempt a login now.
    pub async fn check(&self, identifier: &str) -> Result<RateLimitDecision, AppError> {
        self.check_at(identifier, Utc::now()).await
    }

    /// Checks whether `identifier` may attempt a login at `now`.
    ///
    /// Never records an attempt. Stale entries found along the way are removed.
    pub async fn check_at(
        &self,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, AppError> {
        let Some(entry) = self.store.get(identifier).await? else {
            return Ok(RateLimitDecision::open(&self.policy));
        };

        if let Some(until) = entry.blocked_until {
            if entry.is_blocked_at(now) {
                return Ok(RateLimitDecision::blocked(until, now));
            }
            debug!(identifier = %identifier, "Lockout elapsed, clearing entry");
            self.store.remove(identifier).await?;
            return Ok(RateLimitDecision::open(&self.policy));
        }

        if self.policy.window_expired(entry.window_start, now) {
            debug!(identifier = %identifier, "Attempt window elapsed, clearing entry");
            self.store.remove(identifier).await?;
            return Ok(RateLimitDecision::open(&self.policy));
        }

        let remaining = self.policy.max_attempts.saturating_sub(entry.count);
        Ok(RateLimitDecision::partial(remaining))
    }

    /// Records a failed login for `identifier`.
    pub async fn record_failed_attempt(&self, identifier: &str) -> Result<RateLimitEntry, AppError> {
        self.record_failed_attempt_at(identifier, Utc::now()).await
    }

    /// Records a failed login for `identifier` at `now` and returns the updated entry.
    pub async fn record_failed_attempt_at(
        &self,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitEntry, AppError> {
        let existing = self.store.get(identifier).await?;

        let entry = match existing {
            Some(entry)
                if !self.policy.window_expired(entry.window_start, now)
                    && (entry.blocked_until.is_none() || entry.is_blocked_at(now)) =>
            {
                let mut entry = entry;
                entry.count += 1;
                if entry.count >= self.policy.max_attempts {
                    let until = now + self.policy.block_duration;
                    entry.blocked_until = Some(until);
                    warn!(
                        identifier = %identifier,
                        attempts = entry.count,
                        blocked_until = %until,
                        "Login attempts exhausted, identifier locked out"
                    );
                }
                entry
            }
            _ => RateLimitEntry::first_attempt(now),
        };

        self.store.put(identifier, entry.clone()).await?;
        Ok(entry)
    }

    /// Clears all state for `identifier`, e.g. after a successful login.
    pub async fn reset(&self, identifier: &str) -> Result<(), AppError> {
        self.store.remove(identifier).await?;
        info!(identifier = %identifier, "Login rate limit reset");
        Ok(())
    }
}
