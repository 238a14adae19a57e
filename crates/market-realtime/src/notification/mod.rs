//! Live notification stores and the order/chat pipelines that feed them.

pub mod chat;
pub mod dedup;
pub mod formatter;
pub mod order;
pub mod store;
pub mod unread;

use tracing::{error, info, warn};

use market_core::traits::SubscriptionStatus;

pub use chat::{ChatNotification, ChatNotifications};
pub use order::{OrderNotification, OrderNotifications};
pub use store::{FeedRecord, LiveFeedStore};
pub use unread::UnreadCounter;

/// Log a subscription status change. No corrective action is taken here;
/// reconnecting is the feed's job.
pub(crate) fn log_status(pipeline: &str, status: &SubscriptionStatus) {
    match status {
        SubscriptionStatus::Subscribed => info!(pipeline, "Live feed subscribed"),
        SubscriptionStatus::ChannelError(reason) => {
            error!(pipeline, reason = %reason, "Live feed channel error")
        }
        SubscriptionStatus::TimedOut => warn!(pipeline, "Live feed subscription timed out"),
        SubscriptionStatus::Closed => info!(pipeline, "Live feed closed"),
    }
}
