//! Redis-backed rate-limit store for multi-instance deployments.
//!
//! Entries are stored as JSON under `market:login_attempts:{identifier}`
//! with a TTL, so abandoned identifiers disappear without a sweeper.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use tracing::info;

use market_core::error::AppError;

use super::store::{RateLimitEntry, RateLimitStore};

/// Key prefix for rate-limit entries.
const KEY_PREFIX: &str = "market:login_attempts";

/// Shared rate-limit store on Redis.
#[derive(Clone)]
pub struct RedisRateLimitStore {
    /// Redis connection manager.
    conn: redis::aio::ConnectionManager,
    /// Minimum lifetime of a written entry.
    retention: Duration,
}

impl std::fmt::Debug for RedisRateLimitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRateLimitStore")
            .field("retention", &self.retention)
            .finish()
    }
}

impl RedisRateLimitStore {
    /// Connects to Redis. `retention` should cover the longer of the
    /// attempt window and the lockout.
    pub async fn connect(redis_url: &str, retention: Duration) -> Result<Self, AppError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::cache(format!("Redis connection failed: {e}")))?;

        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| AppError::cache(format!("Redis connection manager failed: {e}")))?;

        info!(retention_secs = retention.as_secs(), "Redis rate-limit store initialized");

        Ok(Self { conn, retention })
    }

    fn key(identifier: &str) -> String {
        format!("{KEY_PREFIX}:{identifier}")
    }

    /// TTL for an entry: the retention period, or the rest of the lockout if longer.
    fn ttl_for(&self, entry: &RateLimitEntry) -> u64 {
        let lockout = entry
            .blocked_until
            .map(|until| (until - Utc::now()).num_seconds().max(0) as u64)
            .unwrap_or(0);
        self.retention.as_secs().max(lockout).max(1)
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn get(&self, identifier: &str) -> Result<Option<RateLimitEntry>, AppError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(Self::key(identifier))
            .await
            .map_err(|e| AppError::cache(format!("Redis GET failed: {e}")))?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, identifier: &str, entry: RateLimitEntry) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(&entry)?;
        let ttl = self.ttl_for(&entry);
        let _: () = conn
            .set_ex(Self::key(identifier), json, ttl)
            .await
            .map_err(|e| AppError::cache(format!("Redis SETEX failed: {e}")))?;
        Ok(())
    }

    async fn remove(&self, identifier: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .del(Self::key(identifier))
            .await
            .map_err(|e| AppError::cache(format!("Redis DEL failed: {e}")))?;
        Ok(())
    }
}
