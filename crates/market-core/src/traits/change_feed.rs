//! Change-feed subscription capability.
//!
//! The notifier never talks to the realtime transport directly. It asks a
//! [`ChangeFeed`] for insert/update events on a named table, optionally
//! narrowed by a single equality predicate, and releases the subscription
//! through the returned [`SubscriptionHandle`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::{ChangeEvent, ChangeKind};
use crate::result::AppResult;
use crate::types::id::SubscriptionId;

/// Which change kinds a subscription receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedEvent {
    /// Every change kind.
    All,
    /// A single change kind.
    Only(ChangeKind),
}

impl FeedEvent {
    /// Wire name used by the realtime protocol (`*` for all).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "*",
            Self::Only(kind) => kind.as_str(),
        }
    }

    /// Whether a change of `kind` is covered.
    pub fn covers(&self, kind: ChangeKind) -> bool {
        match self {
            Self::All => true,
            Self::Only(k) => *k == kind,
        }
    }
}

/// A `field=eq.value` row predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPredicate {
    /// Column name.
    pub field: String,
    /// Expected value, compared as text.
    pub value: String,
}

impl FieldPredicate {
    /// Create an equality predicate.
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Parse the `field=eq.value` filter syntax.
    pub fn parse(filter: &str) -> Option<Self> {
        let (field, rest) = filter.split_once('=')?;
        let value = rest.strip_prefix("eq.")?;
        if field.is_empty() {
            return None;
        }
        Some(Self::eq(field, value))
    }

    /// Whether a row image satisfies the predicate.
    pub fn matches(&self, record: &Value) -> bool {
        match record.get(&self.field) {
            Some(Value::String(s)) => *s == self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

impl fmt::Display for FieldPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=eq.{}", self.field, self.value)
    }
}

/// What a subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedFilter {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub table: String,
    /// Change kinds.
    pub event: FeedEvent,
    /// Optional row predicate.
    pub predicate: Option<FieldPredicate>,
}

impl FeedFilter {
    /// Filter for one change kind on `public.{table}`.
    pub fn new(table: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            schema: "public".to_string(),
            table: table.into(),
            event: FeedEvent::Only(kind),
            predicate: None,
        }
    }

    /// Override the schema.
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Narrow by a row predicate.
    pub fn with_predicate(mut self, predicate: FieldPredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Whether an event falls under this filter.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.schema != self.schema || event.table != self.table {
            return false;
        }
        if !self.event.covers(event.kind) {
            return false;
        }
        match &self.predicate {
            Some(p) => p.matches(&event.record),
            None => true,
        }
    }
}

/// Subscription status reported by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    /// The subscription is live.
    Subscribed,
    /// The channel failed; the feed may be reconnecting.
    ChannelError(String),
    /// The join was not acknowledged in time.
    TimedOut,
    /// The subscription was closed.
    Closed,
}

/// Handle returned by [`ChangeFeed::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    /// Subscription identifier.
    pub id: SubscriptionId,
    /// The filter the subscription was registered with.
    pub filter: FeedFilter,
}

/// Receives events and status updates for one subscription.
#[async_trait]
pub trait ChangeHandler: Send + Sync + 'static {
    /// Handle a row change. Implementations absorb their own errors.
    async fn on_change(&self, event: ChangeEvent);

    /// Handle a subscription status change.
    async fn on_status(&self, status: SubscriptionStatus);
}

/// A source of row-change events.
#[async_trait]
pub trait ChangeFeed: Send + Sync + 'static {
    /// Register `handler` for events matching `filter`.
    async fn subscribe(
        &self,
        filter: FeedFilter,
        handler: Arc<dyn ChangeHandler>,
    ) -> AppResult<SubscriptionHandle>;

    /// Release a subscription. Unknown handles are ignored.
    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> AppResult<()>;

    /// Number of currently registered subscriptions.
    fn active_subscriptions(&self) -> usize;
}
