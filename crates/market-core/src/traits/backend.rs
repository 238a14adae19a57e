//! Read-side collaborators backed by the hosted database.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::id::OrderId;

/// Resolves an order's display number.
#[async_trait]
pub trait OrderLookup: Send + Sync + 'static {
    /// Return the order number for `order_id`, or an error if it cannot be resolved.
    async fn order_number(&self, order_id: OrderId) -> AppResult<String>;
}

/// Counts persisted unread customer messages.
#[async_trait]
pub trait UnreadMessageSource: Send + Sync + 'static {
    /// Number of user-authored chat messages with `is_read = false`.
    async fn unread_message_count(&self) -> AppResult<u64>;
}
