//! Chat message row shapes as seen by the change feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::id::{MessageId, OrderId};

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    /// A customer.
    User,
    /// Store staff.
    Admin,
    /// Any value the notifier does not know about.
    #[serde(other)]
    Other,
}

/// The subset of a chat message row the notifier cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    /// Message identifier.
    pub id: MessageId,
    /// Order the conversation belongs to.
    pub order_id: OrderId,
    /// Author kind.
    pub sender_type: SenderType,
    /// Message body.
    #[serde(default)]
    pub message: String,
    /// Whether staff has read the message.
    #[serde(default)]
    pub is_read: bool,
    /// Creation time.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ChatMessageRecord {
    /// Whether this row counts toward the global unread total.
    pub fn is_unread_from_user(&self) -> bool {
        self.sender_type == SenderType::User && !self.is_read
    }
}

/// Partial row image. Old images may only carry the primary key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessagePatch {
    /// Message identifier.
    #[serde(default)]
    pub id: Option<MessageId>,
    /// Author kind.
    #[serde(default)]
    pub sender_type: Option<SenderType>,
    /// Read flag.
    #[serde(default)]
    pub is_read: Option<bool>,
}
