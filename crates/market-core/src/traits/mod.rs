//! Collaborator traits defined in `market-core` and implemented by other crates.

pub mod alert;
pub mod backend;
pub mod change_feed;

pub use alert::{AudioPlayer, Toast, ToastIcon, ToastSurface};
pub use backend::{OrderLookup, UnreadMessageSource};
pub use change_feed::{
    ChangeFeed, ChangeHandler, FeedEvent, FeedFilter, FieldPredicate, SubscriptionHandle,
    SubscriptionStatus,
};
