//! PostgREST client for order-number lookups and unread counts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use market_core::config::BackendConfig;
use market_core::error::{AppError, ErrorKind};
use market_core::traits::{OrderLookup, UnreadMessageSource};
use market_core::types::OrderId;

/// Row returned by the order-number query.
#[derive(Debug, Deserialize)]
struct OrderNumberRow {
    #[serde(default)]
    order_number: Value,
}

/// Parse the total out of a `Content-Range` header (`0-0/42`, `*/42`).
pub fn parse_content_range(header: &str) -> Option<u64> {
    let (_, total) = header.trim().rsplit_once('/')?;
    total.parse().ok()
}

/// REST client for the hosted database.
#[derive(Debug, Clone)]
pub struct RestBackend {
    /// HTTP client with auth headers preset
    client: Client,
    /// `{url}/rest/v1`
    base: String,
    /// Orders table
    orders_table: String,
    /// Chat messages table
    messages_table: String,
}

impl RestBackend {
    /// Build a client from the backend configuration.
    pub fn new(config: &BackendConfig) -> Result<Self, AppError> {
        if config.url.is_empty() {
            return Err(AppError::configuration("backend.url is required"));
        }
        Url::parse(&config.url).map_err(|e| {
            AppError::configuration(format!("Invalid backend URL '{}': {e}", config.url))
        })?;

        let key = HeaderValue::from_str(&config.anon_key)
            .map_err(|_| AppError::configuration("backend.anon_key is not a valid header value"))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.anon_key))
            .map_err(|_| AppError::configuration("backend.anon_key is not a valid header value"))?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        if config.schema != "public" {
            if let Ok(schema) = HeaderValue::from_str(&config.schema) {
                headers.insert("Accept-Profile", schema);
            }
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .default_headers(headers)
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Internal, "Failed to build HTTP client", e)
            })?;

        Ok(Self {
            client,
            base: format!("{}/rest/v1", config.url.trim_end_matches('/')),
            orders_table: config.orders_table.clone(),
            messages_table: config.messages_table.clone(),
        })
    }

    /// URL for `table` with query parameters.
    fn table_url(&self, table: &str, params: &[(&str, &str)]) -> Result<Url, AppError> {
        Url::parse_with_params(&format!("{}/{table}", self.base), params)
            .map_err(|e| AppError::configuration(format!("Invalid REST URL for {table}: {e}")))
    }

    async fn checked(response: Result<Response, reqwest::Error>, what: &str) -> Result<Response, AppError> {
        let response = response.map_err(|e| {
            AppError::with_source(ErrorKind::ExternalService, format!("{what} request failed"), e)
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::external(format!("{what} failed: {status} {body}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl OrderLookup for RestBackend {
    async fn order_number(&self, order_id: OrderId) -> Result<String, AppError> {
        let id_filter = format!("eq.{order_id}");
        let url = self.table_url(
            &self.orders_table,
            &[("id", id_filter.as_str()), ("select", "order_number"), ("limit", "1")],
        )?;

        let response = Self::checked(self.client.get(url).send().await, "Order lookup").await?;
        let rows: Vec<OrderNumberRow> = response.json().await.map_err(|e| {
            AppError::with_source(ErrorKind::Serialization, "Malformed order lookup response", e)
        })?;

        let number = match rows.into_iter().next().map(|r| r.order_number) {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(AppError::not_found(format!("Order {order_id} not found"))),
        };
        debug!(order_id = %order_id, order_number = %number, "Resolved order number");
        Ok(number)
    }
}

#[async_trait]
impl UnreadMessageSource for RestBackend {
    async fn unread_message_count(&self) -> Result<u64, AppError> {
        let url = self.table_url(
            &self.messages_table,
            &[("select", "id"), ("sender_type", "eq.user"), ("is_read", "eq.false")],
        )?;

        let request = self.client.head(url).header("Prefer", "count=exact");
        let response = Self::checked(request.send().await, "Unread count").await?;

        let header = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::external("Unread count response without Content-Range"))?;
        let count = parse_content_range(header)
            .ok_or_else(|| AppError::external(format!("Unparseable Content-Range '{header}'")))?;

        debug!(count, "Fetched unread chat message count");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackendConfig {
        BackendConfig {
            url: "https://abc.supabase.co/".to_string(),
            anon_key: "anon".to_string(),
            ..BackendConfig::default()
        }
    }

    #[test]
    fn test_parse_content_range() {
        assert_eq!(parse_content_range("0-0/42"), Some(42));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range(" 0-24/3573 "), Some(3573));
        assert_eq!(parse_content_range("*/*"), None);
        assert_eq!(parse_content_range("garbage"), None);
    }

    #[test]
    fn test_table_url_encodes_filters() {
        let backend = RestBackend::new(&config()).unwrap();
        let url = backend
            .table_url("chat_messages", &[("sender_type", "eq.user"), ("is_read", "eq.false")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://abc.supabase.co/rest/v1/chat_messages?sender_type=eq.user&is_read=eq.false"
        );
    }

    #[test]
    fn test_new_requires_url() {
        let err = RestBackend::new(&BackendConfig::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }
}
