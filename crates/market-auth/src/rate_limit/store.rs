//! Rate-limit entry and the storage trait behind the limiter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use market_core::error::AppError;

/// Failed-attempt state for one identifier.
///
/// Open while `blocked_until` is unset or in the past; blocked otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitEntry {
    /// Failed attempts inside the current window.
    pub count: u32,
    /// Time of the first attempt in the current window.
    pub window_start: DateTime<Utc>,
    /// End of the lockout, if one was triggered.
    pub blocked_until: Option<DateTime<Utc>>,
}

impl RateLimitEntry {
    /// A fresh entry for a first failed attempt at `now`.
    pub fn first_attempt(now: DateTime<Utc>) -> Self {
        Self {
            count: 1,
            window_start: now,
            blocked_until: None,
        }
    }

    /// Whether the lockout is still running at `now`.
    pub fn is_blocked_at(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| until > now)
    }
}

/// Keyed storage for rate-limit entries.
///
/// Implementations only persist; every policy decision is made by
/// [`LoginRateLimiter`](super::LoginRateLimiter).
#[async_trait]
pub trait RateLimitStore: Send + Sync + std::fmt::Debug + 'static {
    /// Fetch the entry for `identifier`.
    async fn get(&self, identifier: &str) -> Result<Option<RateLimitEntry>, AppError>;

    /// Insert or replace the entry for `identifier`.
    async fn put(&self, identifier: &str, entry: RateLimitEntry) -> Result<(), AppError>;

    /// Delete the entry for `identifier`. Missing entries are not an error.
    async fn remove(&self, identifier: &str) -> Result<(), AppError>;
}
