//! New-order notification pipeline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use market_core::config::{AlertConfig, RealtimeConfig};
use market_core::events::{ChangeEvent, ChangeKind, OrderRecord};
use market_core::traits::{ChangeHandler, SubscriptionStatus};
use market_core::types::OrderId;

use crate::alert::AlertDispatcher;
use crate::metrics::FeedMetrics;

use super::dedup::EventDeduplicator;
use super::formatter::NotificationFormatter;
use super::store::{FeedRecord, LiveFeedStore};

/// One new-order notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderNotification {
    /// Order identifier
    pub id: OrderId,
    /// Display number
    pub order_number: String,
    /// Order total
    pub total_amount: f64,
    /// When the order was placed
    pub created_at: DateTime<Utc>,
    /// Whether staff acknowledged it
    pub is_read: bool,
}

impl From<OrderRecord> for OrderNotification {
    fn from(record: OrderRecord) -> Self {
        Self {
            id: record.id,
            order_number: record.order_number,
            total_amount: record.total_amount,
            created_at: record.created_at,
            is_read: false,
        }
    }
}

impl FeedRecord for OrderNotification {
    type Id = OrderId;

    fn id(&self) -> OrderId {
        self.id
    }

    fn is_read(&self) -> bool {
        self.is_read
    }

    fn set_read(&mut self, read: bool) {
        self.is_read = read;
    }
}

/// Turns order inserts into notifications, toasts and sounds.
#[derive(Debug)]
pub struct OrderNotifications {
    /// Recent notifications
    store: LiveFeedStore<OrderNotification>,
    /// Repeat suppression
    dedup: EventDeduplicator,
    /// Toast + sound
    alerts: Arc<AlertDispatcher>,
    /// Shared metrics
    metrics: Arc<FeedMetrics>,
    /// Sound for a new order
    sound: String,
    /// Toast visibility
    toast_duration: Duration,
}

impl OrderNotifications {
    /// Create the pipeline
    pub fn new(
        realtime: &RealtimeConfig,
        alert_config: &AlertConfig,
        alerts: Arc<AlertDispatcher>,
        metrics: Arc<FeedMetrics>,
    ) -> Self {
        Self {
            store: LiveFeedStore::new(realtime.buffer_capacity),
            dedup: EventDeduplicator::new(realtime.dedup_window_ms),
            alerts,
            metrics,
            sound: alert_config.order_sound.clone(),
            toast_duration: Duration::from_secs(alert_config.order_toast_seconds),
        }
    }

    /// Recent notifications, newest first
    pub fn notifications(&self) -> Vec<OrderNotification> {
        self.store.snapshot()
    }

    /// Unread notifications among those retained
    pub fn unread_count(&self) -> usize {
        self.store.unread_count()
    }

    /// Mark one notification read; unknown ids are ignored
    pub fn mark_as_read(&self, id: OrderId) {
        self.store.mark_as_read(id);
    }

    /// Mark every retained notification read
    pub fn mark_all_as_read(&self) {
        self.store.mark_all_as_read();
    }

    /// Drop every notification
    pub fn clear(&self) {
        self.store.clear();
    }

    /// The underlying store, for change subscriptions
    pub fn store(&self) -> &LiveFeedStore<OrderNotification> {
        &self.store
    }

    /// Handle an order insert.
    pub async fn handle_insert(&self, event: &ChangeEvent) {
        let record: OrderRecord = match event.record_as() {
            Ok(record) => record,
            Err(e) => {
                self.metrics.record_malformed();
                warn!(error = %e, "Dropping malformed order insert");
                return;
            }
        };

        let key = EventDeduplicator::make_key(&event.table, "INSERT", &record.id.to_string());
        if !self.dedup.should_process(&key) {
            self.metrics.record_deduped();
            trace!(order_id = %record.id, "Order insert deduplicated");
            return;
        }

        let notification = OrderNotification::from(record);
        let toast = NotificationFormatter::new_order(&notification, self.toast_duration);

        debug!(
            order_id = %notification.id,
            order_number = %notification.order_number,
            "New order notification"
        );
        self.store.push(notification);
        self.metrics.record_created();

        self.alerts.alert(toast, &self.sound);
    }
}

#[async_trait]
impl ChangeHandler for OrderNotifications {
    async fn on_change(&self, event: ChangeEvent) {
        self.metrics.record_received();
        match event.kind {
            ChangeKind::Insert => self.handle_insert(&event).await,
            other => trace!(kind = other.as_str(), "Ignoring non-insert order change"),
        }
    }

    async fn on_status(&self, status: SubscriptionStatus) {
        super::log_status("orders", &status);
    }
}
