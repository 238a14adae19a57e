//! Notification engine: owns both pipelines and their subscriptions.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use market_core::config::AppConfig;
use market_core::error::AppError;
use market_core::events::ChangeKind;
use market_core::traits::{
    AudioPlayer, ChangeFeed, ChangeHandler, FeedFilter, FieldPredicate, OrderLookup,
    SubscriptionHandle, ToastSurface, UnreadMessageSource,
};

use crate::alert::AlertDispatcher;
use crate::metrics::{FeedMetrics, MetricsSnapshot};
use crate::notification::{ChatNotifications, OrderNotifications};

/// External collaborators the engine is wired to.
pub struct EngineCollaborators {
    /// Source of row changes
    pub feed: Arc<dyn ChangeFeed>,
    /// Order-number resolution for chat notifications
    pub lookup: Arc<dyn OrderLookup>,
    /// Persisted unread count
    pub unread_source: Arc<dyn UnreadMessageSource>,
    /// Sound output
    pub audio: Arc<dyn AudioPlayer>,
    /// Toast output
    pub toasts: Arc<dyn ToastSurface>,
}

/// Runs the order and chat pipelines against a change feed.
///
/// At most one set of subscriptions is active at a time.
pub struct NotificationEngine {
    /// Order pipeline
    orders: Arc<OrderNotifications>,
    /// Chat pipeline
    chat: Arc<ChatNotifications>,
    /// Toast + sound
    alerts: Arc<AlertDispatcher>,
    /// Shared metrics
    metrics: Arc<FeedMetrics>,
    /// Change source
    feed: Arc<dyn ChangeFeed>,
    /// Schema of the watched tables
    schema: String,
    /// Orders table
    orders_table: String,
    /// Chat messages table
    messages_table: String,
    /// Active subscriptions
    handles: Mutex<Vec<SubscriptionHandle>>,
    /// Whether subscriptions are active
    running: AtomicBool,
}

impl std::fmt::Debug for NotificationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationEngine")
            .field("running", &self.is_running())
            .finish()
    }
}

impl NotificationEngine {
    /// Build both pipelines. Nothing is subscribed until [`start`](Self::start).
    pub fn new(config: &AppConfig, collaborators: EngineCollaborators) -> Self {
        let metrics = Arc::new(FeedMetrics::new());
        let alerts = Arc::new(AlertDispatcher::new(
            collaborators.audio,
            collaborators.toasts,
            metrics.clone(),
        ));
        let orders = Arc::new(OrderNotifications::new(
            &config.realtime,
            &config.alerts,
            alerts.clone(),
            metrics.clone(),
        ));
        let chat = Arc::new(ChatNotifications::new(
            &config.realtime,
            &config.alerts,
            collaborators.lookup,
            collaborators.unread_source,
            alerts.clone(),
            metrics.clone(),
        ));

        info!(
            buffer_capacity = config.realtime.buffer_capacity,
            "Notification engine initialized"
        );

        Self {
            orders,
            chat,
            alerts,
            metrics,
            feed: collaborators.feed,
            schema: config.backend.schema.clone(),
            orders_table: config.backend.orders_table.clone(),
            messages_table: config.backend.messages_table.clone(),
            handles: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Load the unread total and subscribe both pipelines.
    ///
    /// Fails with a conflict if already running. A failed unread count
    /// query is logged and the total starts at zero.
    pub async fn start(&self) -> Result<(), AppError> {
        let mut handles = self.handles.lock().await;
        if !handles.is_empty() {
            return Err(AppError::conflict("Notification engine is already running"));
        }

        self.alerts.rearm().await;

        if let Err(e) = self.chat.initialize_unread_total().await {
            warn!(error = %e, "Could not load unread chat message total, starting from zero");
        }

        let from_user = FieldPredicate::eq("sender_type", "user");
        let subscriptions: [(FeedFilter, Arc<dyn ChangeHandler>); 3] = [
            (
                FeedFilter::new(&self.orders_table, ChangeKind::Insert).in_schema(&self.schema),
                self.orders.clone(),
            ),
            (
                FeedFilter::new(&self.messages_table, ChangeKind::Insert)
                    .in_schema(&self.schema)
                    .with_predicate(from_user.clone()),
                self.chat.clone(),
            ),
            (
                FeedFilter::new(&self.messages_table, ChangeKind::Update)
                    .in_schema(&self.schema)
                    .with_predicate(from_user),
                self.chat.clone(),
            ),
        ];

        for (filter, handler) in subscriptions {
            match self.feed.subscribe(filter, handler).await {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    error!(error = %e, "Subscription failed, rolling back");
                    for handle in handles.drain(..) {
                        if let Err(e) = self.feed.unsubscribe(&handle).await {
                            warn!(subscription_id = %handle.id, error = %e, "Rollback unsubscribe failed");
                        }
                    }
                    return Err(e);
                }
            }
        }

        self.running.store(true, Ordering::SeqCst);
        info!(subscriptions = handles.len(), "Notification engine started");
        Ok(())
    }

    /// Unsubscribe everything and release the audio player. Safe to call twice.
    pub async fn shutdown(&self) {
        let handles: Vec<SubscriptionHandle> = self.handles.lock().await.drain(..).collect();
        if handles.is_empty() && !self.is_running() {
            return;
        }

        for handle in &handles {
            if let Err(e) = self.feed.unsubscribe(handle).await {
                warn!(subscription_id = %handle.id, error = %e, "Unsubscribe failed");
            }
        }
        self.alerts.release().await;
        self.running.store(false, Ordering::SeqCst);
        info!(released = handles.len(), "Notification engine stopped");
    }

    /// Whether subscriptions are active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Order pipeline.
    pub fn orders(&self) -> &Arc<OrderNotifications> {
        &self.orders
    }

    /// Chat pipeline.
    pub fn chat(&self) -> &Arc<ChatNotifications> {
        &self.chat
    }

    /// Counters since construction.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
