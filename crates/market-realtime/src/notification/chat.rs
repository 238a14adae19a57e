//! New-chat-message notification pipeline.
//!
//! Besides the bounded buffer shared with orders, this pipeline keeps a
//! global unread total:
//! - starts from a one-time count query
//! - +1 on insert of an unread customer message
//! - -1 on an update that marks a customer message read (floored at 0)
//! - re-queried after the subscription recovers from an interruption

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use market_core::config::{AlertConfig, RealtimeConfig};
use market_core::error::AppError;
use market_core::events::{ChangeEvent, ChangeKind, ChatMessagePatch, ChatMessageRecord, SenderType};
use market_core::traits::{ChangeHandler, OrderLookup, SubscriptionStatus, UnreadMessageSource};
use market_core::types::{MessageId, OrderId};

use crate::alert::AlertDispatcher;
use crate::metrics::FeedMetrics;

use super::dedup::EventDeduplicator;
use super::formatter::NotificationFormatter;
use super::store::{FeedRecord, LiveFeedStore};
use super::unread::UnreadCounter;

/// Label shown when an order number cannot be resolved.
pub const UNKNOWN_ORDER_NUMBER: &str = "unknown";

/// One new-chat-message notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatNotification {
    /// Message identifier
    pub id: MessageId,
    /// Order the conversation belongs to
    pub order_id: OrderId,
    /// Display number of that order, or [`UNKNOWN_ORDER_NUMBER`]
    pub order_number: String,
    /// Message body
    pub message: String,
    /// When the message was sent
    pub created_at: DateTime<Utc>,
    /// Whether staff has read it
    pub is_read: bool,
}

impl FeedRecord for ChatNotification {
    type Id = MessageId;

    fn id(&self) -> MessageId {
        self.id
    }

    fn is_read(&self) -> bool {
        self.is_read
    }

    fn set_read(&mut self, read: bool) {
        self.is_read = read;
    }
}

/// Turns customer chat messages into notifications and keeps the unread total.
pub struct ChatNotifications {
    /// Recent notifications
    store: LiveFeedStore<ChatNotification>,
    /// Unread customer messages across the whole dataset
    unread_total: UnreadCounter,
    /// Order-number resolution
    lookup: Arc<dyn OrderLookup>,
    /// Persisted unread count
    unread_source: Arc<dyn UnreadMessageSource>,
    /// Repeat suppression
    dedup: EventDeduplicator,
    /// Toast + sound
    alerts: Arc<AlertDispatcher>,
    /// Shared metrics
    metrics: Arc<FeedMetrics>,
    /// Sound for a new message
    sound: String,
    /// Toast visibility
    toast_duration: Duration,
    /// Upper bound on one lookup
    lookup_timeout: Duration,
    /// Set when the subscription reported a failure
    interrupted: AtomicBool,
}

impl std::fmt::Debug for ChatNotifications {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatNotifications")
            .field("buffered", &self.store.len())
            .field("unread_total", &self.unread_total.get())
            .finish()
    }
}

impl ChatNotifications {
    /// Create the pipeline with an unread total of zero
    pub fn new(
        realtime: &RealtimeConfig,
        alert_config: &AlertConfig,
        lookup: Arc<dyn OrderLookup>,
        unread_source: Arc<dyn UnreadMessageSource>,
        alerts: Arc<AlertDispatcher>,
        metrics: Arc<FeedMetrics>,
    ) -> Self {
        Self {
            store: LiveFeedStore::new(realtime.buffer_capacity),
            unread_total: UnreadCounter::default(),
            lookup,
            unread_source,
            dedup: EventDeduplicator::new(realtime.dedup_window_ms),
            alerts,
            metrics,
            sound: alert_config.chat_sound.clone(),
            toast_duration: Duration::from_secs(alert_config.chat_toast_seconds),
            lookup_timeout: Duration::from_millis(realtime.lookup_timeout_ms),
            interrupted: AtomicBool::new(false),
        }
    }

    /// Recent notifications, newest first
    pub fn notifications(&self) -> Vec<ChatNotification> {
        self.store.snapshot()
    }

    /// Unread notifications among those retained
    pub fn unread_count(&self) -> usize {
        self.store.unread_count()
    }

    /// Unread customer messages across the whole dataset
    pub fn total_unread_messages(&self) -> u64 {
        self.unread_total.get()
    }

    /// Mark one notification read; unknown ids are ignored
    pub fn mark_as_read(&self, id: MessageId) {
        self.store.mark_as_read(id);
    }

    /// Mark every retained notification read
    pub fn mark_all_as_read(&self) {
        self.store.mark_all_as_read();
    }

    /// Drop every notification. The global unread total is left alone.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// The underlying store, for change subscriptions
    pub fn store(&self) -> &LiveFeedStore<ChatNotification> {
        &self.store
    }

    /// Receiver that sees every new value of the global unread total
    pub fn watch_unread_total(&self) -> watch::Receiver<u64> {
        self.unread_total.subscribe()
    }

    /// Load the unread total from the backend. Call once at startup.
    pub async fn initialize_unread_total(&self) -> Result<u64, AppError> {
        let count = self.unread_source.unread_message_count().await?;
        self.unread_total.set(count);
        info!(count, "Unread chat message total initialized");
        Ok(count)
    }

    /// Re-query the unread total; on failure the last value is kept.
    pub async fn refresh_unread_total(&self) {
        match self.unread_source.unread_message_count().await {
            Ok(count) => {
                let previous = self.unread_total.get();
                self.unread_total.set(count);
                if previous != count {
                    info!(previous, count, "Unread chat message total resynchronized");
                }
            }
            Err(e) => warn!(error = %e, "Unread chat message count refresh failed"),
        }
    }

    /// Handle a chat message insert.
    pub async fn handle_insert(&self, event: &ChangeEvent) {
        let record: ChatMessageRecord = match event.record_as() {
            Ok(record) => record,
            Err(e) => {
                self.metrics.record_malformed();
                warn!(error = %e, "Dropping malformed chat message insert");
                return;
            }
        };

        if record.sender_type != SenderType::User {
            trace!(message_id = %record.id, "Ignoring non-customer chat message");
            return;
        }

        let key = EventDeduplicator::make_key(&event.table, "INSERT", &record.id.to_string());
        if !self.dedup.should_process(&key) {
            self.metrics.record_deduped();
            trace!(message_id = %record.id, "Chat message insert deduplicated");
            return;
        }

        if record.is_unread_from_user() {
            self.unread_total.increment();
        }

        let order_number = self.resolve_order_number(record.order_id).await;

        let notification = ChatNotification {
            id: record.id,
            order_id: record.order_id,
            order_number,
            message: record.message,
            created_at: record.created_at,
            is_read: record.is_read,
        };
        let toast = NotificationFormatter::new_message(&notification, self.toast_duration);

        debug!(
            message_id = %notification.id,
            order_number = %notification.order_number,
            "New chat message notification"
        );
        self.store.push(notification);
        self.metrics.record_created();

        self.alerts.alert(toast, &self.sound);
    }

    /// Handle a chat message update.
    pub async fn handle_update(&self, event: &ChangeEvent) {
        let record: ChatMessageRecord = match event.record_as() {
            Ok(record) => record,
            Err(e) => {
                self.metrics.record_malformed();
                warn!(error = %e, "Dropping malformed chat message update");
                return;
            }
        };
        let old: ChatMessagePatch = match event.old_record_as() {
            Ok(old) => old.unwrap_or_default(),
            Err(e) => {
                debug!(error = %e, "Unreadable old chat row, treating as unknown");
                ChatMessagePatch::default()
            }
        };

        let became_read = record.sender_type == SenderType::User
            && record.is_read
            && old.is_read != Some(true);

        if became_read {
            let total = self.unread_total.decrement();
            debug!(message_id = %record.id, total, "Chat message marked read");
        }

        self.store.set_read(record.id, record.is_read);
    }

    /// Resolve a display number, falling back to [`UNKNOWN_ORDER_NUMBER`].
    async fn resolve_order_number(&self, order_id: OrderId) -> String {
        match tokio::time::timeout(self.lookup_timeout, self.lookup.order_number(order_id)).await {
            Ok(Ok(number)) => number,
            Ok(Err(e)) => {
                self.metrics.record_lookup_failure();
                warn!(order_id = %order_id, error = %e, "Order number lookup failed");
                UNKNOWN_ORDER_NUMBER.to_string()
            }
            Err(_) => {
                self.metrics.record_lookup_failure();
                warn!(
                    order_id = %order_id,
                    timeout_ms = self.lookup_timeout.as_millis() as u64,
                    "Order number lookup timed out"
                );
                UNKNOWN_ORDER_NUMBER.to_string()
            }
        }
    }
}

#[async_trait]
impl ChangeHandler for ChatNotifications {
    async fn on_change(&self, event: ChangeEvent) {
        self.metrics.record_received();
        match event.kind {
            ChangeKind::Insert => self.handle_insert(&event).await,
            ChangeKind::Update => self.handle_update(&event).await,
            ChangeKind::Delete => trace!("Ignoring chat message delete"),
        }
    }

    async fn on_status(&self, status: SubscriptionStatus) {
        super::log_status("chat", &status);
        match status {
            SubscriptionStatus::Subscribed => {
                if self.interrupted.swap(false, Ordering::SeqCst) {
                    self.refresh_unread_total().await;
                }
            }
            SubscriptionStatus::ChannelError(_) | SubscriptionStatus::TimedOut => {
                self.interrupted.store(true, Ordering::SeqCst);
            }
            SubscriptionStatus::Closed => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{SilentAudioPlayer, TracingToastSurface};
    use serde_json::{Value, json};

    struct FixedLookup;

    #[async_trait]
    impl OrderLookup for FixedLookup {
        async fn order_number(&self, _order_id: OrderId) -> Result<String, AppError> {
            Ok("1042".to_string())
        }
    }

    struct FixedCount(u64);

    #[async_trait]
    impl UnreadMessageSource for FixedCount {
        async fn unread_message_count(&self) -> Result<u64, AppError> {
            Ok(self.0)
        }
    }

    async fn pipeline(initial_unread: u64) -> ChatNotifications {
        let metrics = Arc::new(FeedMetrics::new());
        let alerts = Arc::new(AlertDispatcher::new(
            Arc::new(SilentAudioPlayer),
            Arc::new(TracingToastSurface),
            metrics.clone(),
        ));
        let chat = ChatNotifications::new(
            &RealtimeConfig::default(),
            &AlertConfig::default(),
            Arc::new(FixedLookup),
            Arc::new(FixedCount(initial_unread)),
            alerts,
            metrics,
        );
        chat.initialize_unread_total().await.unwrap();
        chat
    }

    fn row(id: MessageId, is_read: bool) -> Value {
        json!({
            "id": id,
            "order_id": OrderId::new(),
            "sender_type": "user",
            "message": "kargo ne zaman?",
            "is_read": is_read,
            "created_at": "2025-03-01T10:05:00Z",
        })
    }

    fn update(id: MessageId, is_read: bool, old: Option<Value>) -> ChangeEvent {
        ChangeEvent::update("chat_messages", row(id, is_read), old)
    }

    #[tokio::test]
    async fn test_update_of_already_read_row_keeps_total() {
        let chat = pipeline(3).await;
        let id = MessageId::new();

        chat.handle_update(&update(id, true, Some(row(id, true)))).await;
        assert_eq!(chat.total_unread_messages(), 3);
    }

    #[tokio::test]
    async fn test_update_that_leaves_row_unread_keeps_total() {
        let chat = pipeline(3).await;
        let id = MessageId::new();

        chat.handle_update(&update(id, false, Some(row(id, false)))).await;
        chat.handle_update(&update(id, false, Some(json!({ "id": id })))).await;
        assert_eq!(chat.total_unread_messages(), 3);
    }

    #[tokio::test]
    async fn test_unread_to_read_transition_decrements() {
        let chat = pipeline(3).await;
        let id = MessageId::new();

        chat.handle_update(&update(id, true, Some(row(id, false)))).await;
        assert_eq!(chat.total_unread_messages(), 2);

        chat.handle_update(&update(id, true, Some(json!({ "id": id })))).await;
        chat.handle_update(&update(id, true, None)).await;
        assert_eq!(chat.total_unread_messages(), 0);
    }

    #[tokio::test]
    async fn test_admin_row_update_keeps_total() {
        let chat = pipeline(1).await;
        let id = MessageId::new();
        let mut record = row(id, true);
        record["sender_type"] = json!("admin");

        chat.handle_update(&ChangeEvent::update("chat_messages", record, None))
            .await;
        assert_eq!(chat.total_unread_messages(), 1);
    }

    #[tokio::test]
    async fn test_redundant_update_does_not_notify_listeners() {
        let chat = pipeline(0).await;
        let id = MessageId::new();
        chat.handle_insert(&ChangeEvent::insert("chat_messages", row(id, false)))
            .await;
        assert_eq!(chat.notifications()[0].order_number, "1042");

        let rx = chat.store().subscribe();
        let before = *rx.borrow();
        chat.handle_update(&update(id, false, Some(row(id, false)))).await;
        assert_eq!(*rx.borrow(), before);

        chat.handle_update(&update(id, true, Some(row(id, false)))).await;
        assert_eq!(*rx.borrow(), before + 1);
        assert_eq!(chat.unread_count(), 0);
    }

    #[tokio::test]
    async fn test_watch_unread_total_sees_changes() {
        let chat = pipeline(2).await;
        let rx = chat.watch_unread_total();
        assert_eq!(*rx.borrow(), 2);

        chat.handle_insert(&ChangeEvent::insert("chat_messages", row(MessageId::new(), false)))
            .await;
        assert_eq!(*rx.borrow(), 3);
    }
}
