//! In-memory rate-limit store for single-process deployments.

use async_trait::async_trait;
use dashmap::DashMap;

use market_core::error::AppError;

use super::store::{RateLimitEntry, RateLimitStore};

/// Process-local entry map. State is lost on restart and is not shared
/// with other processes.
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    /// Identifier → entry.
    entries: DashMap<String, RateLimitEntry>,
}

impl MemoryRateLimitStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identifiers currently tracked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no identifier is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn get(&self, identifier: &str) -> Result<Option<RateLimitEntry>, AppError> {
        Ok(self.entries.get(identifier).map(|e| e.value().clone()))
    }

    async fn put(&self, identifier: &str, entry: RateLimitEntry) -> Result<(), AppError> {
        self.entries.insert(identifier.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, identifier: &str) -> Result<(), AppError> {
        self.entries.remove(identifier);
        Ok(())
    }
}
