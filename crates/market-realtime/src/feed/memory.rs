//! In-process change feed.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{debug, trace};

use market_core::error::AppError;
use market_core::events::ChangeEvent;
use market_core::traits::{
    ChangeFeed, ChangeHandler, FeedFilter, SubscriptionHandle, SubscriptionStatus,
};
use market_core::types::SubscriptionId;

/// A registered subscription.
struct Registration {
    /// Subscription ID
    id: SubscriptionId,
    /// Filter
    filter: FeedFilter,
    /// Receiver
    handler: Arc<dyn ChangeHandler>,
}

/// Change feed that delivers published events to matching handlers.
///
/// `publish` awaits each handler in subscription order before returning, so
/// events published one after another are processed one after another.
#[derive(Default)]
pub struct MemoryChangeFeed {
    /// Registrations in subscription order
    registrations: RwLock<Vec<Registration>>,
}

impl std::fmt::Debug for MemoryChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryChangeFeed")
            .field("subscriptions", &self.active_subscriptions())
            .finish()
    }
}

impl MemoryChangeFeed {
    /// Create an empty feed
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every matching subscription. Returns how many received it.
    pub async fn publish(&self, event: ChangeEvent) -> usize {
        let targets = self.handlers_where(|r| r.filter.matches(&event));
        trace!(
            table = %event.table,
            kind = event.kind.as_str(),
            targets = targets.len(),
            "Publishing change event"
        );
        for handler in &targets {
            handler.on_change(event.clone()).await;
        }
        targets.len()
    }

    /// Report `status` to every subscription.
    pub async fn emit_status(&self, status: SubscriptionStatus) {
        for handler in self.handlers_where(|_| true) {
            handler.on_status(status.clone()).await;
        }
    }

    fn handlers_where(&self, pred: impl Fn(&Registration) -> bool) -> Vec<Arc<dyn ChangeHandler>> {
        self.registrations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| pred(r))
            .map(|r| r.handler.clone())
            .collect()
    }
}

#[async_trait]
impl ChangeFeed for MemoryChangeFeed {
    async fn subscribe(
        &self,
        filter: FeedFilter,
        handler: Arc<dyn ChangeHandler>,
    ) -> Result<SubscriptionHandle, AppError> {
        let handle = SubscriptionHandle {
            id: SubscriptionId::new(),
            filter: filter.clone(),
        };
        self.registrations
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Registration {
                id: handle.id,
                filter,
                handler: handler.clone(),
            });
        debug!(subscription_id = %handle.id, table = %handle.filter.table, "Subscribed");
        handler.on_status(SubscriptionStatus::Subscribed).await;
        Ok(handle)
    }

    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), AppError> {
        let removed = {
            let mut registrations = self.registrations.write().unwrap_or_else(|e| e.into_inner());
            registrations
                .iter()
                .position(|r| r.id == handle.id)
                .map(|idx| registrations.remove(idx))
        };
        if let Some(registration) = removed {
            debug!(subscription_id = %handle.id, "Unsubscribed");
            registration.handler.on_status(SubscriptionStatus::Closed).await;
        }
        Ok(())
    }

    fn active_subscriptions(&self) -> usize {
        self.registrations.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
