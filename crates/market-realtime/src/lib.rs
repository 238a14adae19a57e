//! # market-realtime
//!
//! Live notification engine for the Deniz Market admin panel. Provides:
//!
//! - Bounded, most-recent-first notification stores for orders and chat
//! - A global unread chat message counter kept in step with the change feed
//! - Best-effort audio and toast alerts per incoming event
//! - Change-feed clients: in-memory and Supabase Realtime (with reconnect)
//! - PostgREST lookups for order numbers and unread counts

pub mod alert;
pub mod backend;
pub mod engine;
pub mod feed;
pub mod metrics;
pub mod notification;

pub use alert::AlertDispatcher;
pub use engine::{EngineCollaborators, NotificationEngine};
pub use feed::{MemoryChangeFeed, SupabaseRealtimeFeed};
pub use metrics::{FeedMetrics, MetricsSnapshot};
pub use notification::{ChatNotifications, LiveFeedStore, OrderNotifications, UnreadCounter};
