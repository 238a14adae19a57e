//! Change-feed events delivered by the backend's realtime layer.
//!
//! A [`ChangeEvent`] carries the raw row images; the typed record shapes
//! in [`order`] and [`chat`] are decoded from them by the pipelines.

pub mod chat;
pub mod order;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use chat::{ChatMessagePatch, ChatMessageRecord, SenderType};
pub use order::OrderRecord;

use crate::error::AppError;

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    /// A row was inserted.
    Insert,
    /// A row was updated.
    Update,
    /// A row was deleted.
    Delete,
}

impl ChangeKind {
    /// Wire name used by the realtime protocol.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    /// Parse a wire name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// A single row change pushed by the change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Schema of the changed table.
    pub schema: String,
    /// Name of the changed table.
    pub table: String,
    /// Kind of change.
    pub kind: ChangeKind,
    /// New row image (empty object for deletes).
    pub record: Value,
    /// Old row image, when the backend provides one.
    #[serde(default)]
    pub old_record: Option<Value>,
    /// Commit time reported by the backend, if any.
    #[serde(default)]
    pub commit_timestamp: Option<DateTime<Utc>>,
}

impl ChangeEvent {
    /// Build an insert event for `public.{table}`.
    pub fn insert(table: impl Into<String>, record: Value) -> Self {
        Self {
            schema: "public".to_string(),
            table: table.into(),
            kind: ChangeKind::Insert,
            record,
            old_record: None,
            commit_timestamp: None,
        }
    }

    /// Build an update event for `public.{table}`.
    pub fn update(table: impl Into<String>, record: Value, old_record: Option<Value>) -> Self {
        Self {
            schema: "public".to_string(),
            table: table.into(),
            kind: ChangeKind::Update,
            record,
            old_record,
            commit_timestamp: None,
        }
    }

    /// Decode the new row image into a typed record.
    pub fn record_as<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_value(self.record.clone()).map_err(|e| {
            AppError::validation(format!(
                "Malformed {} row in {} event: {e}",
                self.table,
                self.kind.as_str()
            ))
        })
    }

    /// Decode the old row image, if present.
    pub fn old_record_as<T: DeserializeOwned>(&self) -> Result<Option<T>, AppError> {
        match &self.old_record {
            Some(old) if !old.is_null() => serde_json::from_value(old.clone())
                .map(Some)
                .map_err(|e| AppError::validation(format!("Malformed old {} row: {e}", self.table))),
            _ => Ok(None),
        }
    }
}
