//! Shared domain types.

pub mod id;

pub use id::{MessageId, OrderId, SubscriptionId};
