//! Failed-login rate limiting.
//!
//! The policy (window, threshold, lockout) lives in [`policy`]; entries are
//! kept in a [`RateLimitStore`], either:
//! - an in-memory map (one process, the default)
//! - Redis (shared between instances)

pub mod limiter;
pub mod memory;
pub mod policy;
#[cfg(feature = "redis-store")]
pub mod redis;
pub mod store;

use std::sync::Arc;

use tracing::info;

use market_core::config::{RateLimitConfig, RateLimitStoreKind};
use market_core::error::AppError;

pub use limiter::LoginRateLimiter;
pub use memory::MemoryRateLimitStore;
pub use policy::{RateLimitDecision, RateLimitPolicy};
pub use store::{RateLimitEntry, RateLimitStore};

/// Build a limiter with the store selected in configuration.
pub async fn build_limiter(config: &RateLimitConfig) -> Result<LoginRateLimiter, AppError> {
    let policy = RateLimitPolicy::from_config(config);

    let store: Arc<dyn RateLimitStore> = match config.store {
        RateLimitStoreKind::Memory => Arc::new(MemoryRateLimitStore::new()),
        #[cfg(feature = "redis-store")]
        RateLimitStoreKind::Redis => {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                AppError::configuration("auth.rate_limit.redis_url is required for the redis store")
            })?;
            let retention = policy.window.max(policy.block_duration).to_std().map_err(|e| {
                AppError::configuration(format!("Invalid rate-limit durations: {e}"))
            })?;
            Arc::new(redis::RedisRateLimitStore::connect(url, retention).await?)
        }
        #[cfg(not(feature = "redis-store"))]
        RateLimitStoreKind::Redis => {
            return Err(AppError::configuration(
                "redis rate-limit store requested but the redis-store feature is disabled",
            ));
        }
    };

    info!(
        store = ?config.store,
        max_attempts = policy.max_attempts,
        window_minutes = config.window_minutes,
        block_minutes = config.block_minutes,
        "Login rate limiter initialized"
    );

    Ok(LoginRateLimiter::new(store, policy))
}
