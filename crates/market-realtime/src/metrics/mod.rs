//! Notification pipeline metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Pipeline-level counters.
#[derive(Debug, Default)]
pub struct FeedMetrics {
    /// Change events received from the feed
    pub events_received: AtomicU64,
    /// Notifications added to a store
    pub notifications_created: AtomicU64,
    /// Insert events dropped as duplicates
    pub events_deduplicated: AtomicU64,
    /// Events whose row image could not be decoded
    pub events_malformed: AtomicU64,
    /// Order-number lookups that failed or timed out
    pub lookup_failures: AtomicU64,
    /// Audio playbacks that failed
    pub playback_failures: AtomicU64,
    /// Toasts shown
    pub toasts_shown: AtomicU64,
}

impl FeedMetrics {
    /// Create zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a received event
    pub fn record_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a created notification
    pub fn record_created(&self) {
        self.notifications_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a deduplicated event
    pub fn record_deduped(&self) {
        self.events_deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an undecodable event
    pub fn record_malformed(&self) {
        self.events_malformed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed lookup
    pub fn record_lookup_failure(&self) {
        self.lookup_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed playback
    pub fn record_playback_failure(&self) {
        self.playback_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a shown toast
    pub fn record_toast(&self) {
        self.toasts_shown.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            notifications_created: self.notifications_created.load(Ordering::Relaxed),
            events_deduplicated: self.events_deduplicated.load(Ordering::Relaxed),
            events_malformed: self.events_malformed.load(Ordering::Relaxed),
            lookup_failures: self.lookup_failures.load(Ordering::Relaxed),
            playback_failures: self.playback_failures.load(Ordering::Relaxed),
            toasts_shown: self.toasts_shown.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Change events received
    pub events_received: u64,
    /// Notifications created
    pub notifications_created: u64,
    /// Duplicate inserts dropped
    pub events_deduplicated: u64,
    /// Undecodable events
    pub events_malformed: u64,
    /// Failed order-number lookups
    pub lookup_failures: u64,
    /// Failed audio playbacks
    pub playback_failures: u64,
    /// Toasts shown
    pub toasts_shown: u64,
}
