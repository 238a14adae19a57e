//! Phoenix channel frames used by Supabase Realtime.
//!
//! Frames are JSON objects `{topic, event, payload, ref, join_ref}`. A
//! channel is joined with `phx_join` carrying a `postgres_changes` config,
//! row changes arrive as `postgres_changes` events on the channel topic, and
//! the socket is kept alive by `heartbeat` frames on the `phoenix` topic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use market_core::error::AppError;
use market_core::events::{ChangeEvent, ChangeKind};
use market_core::traits::FeedFilter;
use market_core::types::SubscriptionId;

/// Protocol version sent in the connect URL.
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Topic used for socket-level heartbeats.
pub const HEARTBEAT_TOPIC: &str = "phoenix";

/// One wire frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    /// Channel topic
    pub topic: String,
    /// Event name
    pub event: String,
    /// Event payload
    #[serde(default)]
    pub payload: Value,
    /// Message reference, echoed in replies
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    /// Reference of the join that opened the channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

impl PhoenixMessage {
    /// `phx_join` for a postgres_changes channel.
    pub fn join(topic: &str, filter: &FeedFilter, access_token: &str, reference: &str) -> Self {
        let mut change = json!({
            "event": filter.event.as_str(),
            "schema": filter.schema,
            "table": filter.table,
        });
        if let Some(predicate) = &filter.predicate {
            change["filter"] = Value::String(predicate.to_string());
        }
        Self {
            topic: topic.to_string(),
            event: "phx_join".to_string(),
            payload: json!({
                "config": {
                    "broadcast": { "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": [change],
                },
                "access_token": access_token,
            }),
            reference: Some(reference.to_string()),
            join_ref: Some(reference.to_string()),
        }
    }

    /// `phx_leave` for a channel.
    pub fn leave(topic: &str, reference: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: "phx_leave".to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: None,
        }
    }

    /// Socket heartbeat.
    pub fn heartbeat(reference: &str) -> Self {
        Self {
            topic: HEARTBEAT_TOPIC.to_string(),
            event: "heartbeat".to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: None,
        }
    }

    /// Serialize to a text frame body.
    pub fn encode(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Channel topic for a subscription.
pub fn topic_for(filter: &FeedFilter, id: SubscriptionId) -> String {
    format!("realtime:{}:{}-{}", filter.schema, filter.table, id)
}

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// `phx_reply` to a join, leave or heartbeat
    Reply {
        /// Channel topic
        topic: String,
        /// Reference of the request
        reference: Option<String>,
        /// Error reason, `None` when the status is ok
        error: Option<String>,
    },
    /// A row change on a channel
    Change {
        /// Channel topic
        topic: String,
        /// The change
        event: ChangeEvent,
    },
    /// `system` status message for a channel
    System {
        /// Channel topic
        topic: String,
        /// Error message, `None` when the status is ok
        error: Option<String>,
    },
    /// `phx_error`: the server-side channel crashed
    ChannelError {
        /// Channel topic
        topic: String,
    },
    /// `phx_close`: the channel was closed
    ChannelClosed {
        /// Channel topic
        topic: String,
    },
    /// Anything else (presence, broadcast, ...)
    Ignored,
}

/// Decode a text frame.
pub fn decode(text: &str) -> Result<Inbound, AppError> {
    let msg: PhoenixMessage = serde_json::from_str(text)?;
    let topic = msg.topic;
    let inbound = match msg.event.as_str() {
        "phx_reply" => Inbound::Reply {
            topic,
            reference: msg.reference,
            error: status_error(&msg.payload, "response"),
        },
        "postgres_changes" => Inbound::Change {
            topic,
            event: parse_change(&msg.payload)?,
        },
        "system" => Inbound::System {
            topic,
            error: status_error(&msg.payload, "message"),
        },
        "phx_error" => Inbound::ChannelError { topic },
        "phx_close" => Inbound::ChannelClosed { topic },
        _ => Inbound::Ignored,
    };
    Ok(inbound)
}

/// Extract an error description from a `{status, <detail_key>}` payload.
fn status_error(payload: &Value, detail_key: &str) -> Option<String> {
    let status = payload.get("status").and_then(Value::as_str).unwrap_or("ok");
    if status == "ok" {
        return None;
    }
    let detail = match payload.get(detail_key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(map)) => map
            .get("reason")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
        Some(other) if !other.is_null() => other.to_string(),
        _ => String::new(),
    };
    Some(if detail.is_empty() { status.to_string() } else { detail })
}

/// Parse a `postgres_changes` payload into a [`ChangeEvent`].
fn parse_change(payload: &Value) -> Result<ChangeEvent, AppError> {
    let data = payload
        .get("data")
        .ok_or_else(|| AppError::validation("postgres_changes payload without data"))?;

    let text = |key: &str| -> Result<String, AppError> {
        data.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::validation(format!("postgres_changes data without {key}")))
    };

    let kind_name = text("type")?;
    let kind = ChangeKind::parse(&kind_name)
        .ok_or_else(|| AppError::validation(format!("Unknown change type '{kind_name}'")))?;

    let record = data.get("record").cloned().unwrap_or_else(|| json!({}));
    let old_record = data
        .get("old_record")
        .filter(|v| v.as_object().is_some_and(|o| !o.is_empty()))
        .cloned();
    let commit_timestamp = data
        .get("commit_timestamp")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(ChangeEvent {
        schema: text("schema")?,
        table: text("table")?,
        kind,
        record,
        old_record,
        commit_timestamp,
    })
}
