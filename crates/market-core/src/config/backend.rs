//! Hosted backend connection settings.

use serde::{Deserialize, Serialize};

/// Connection settings for the hosted backend (REST + realtime).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    #[serde(default)]
    pub url: String,
    /// Public (anon) API key sent as `apikey` and bearer token.
    #[serde(default)]
    pub anon_key: String,
    /// Database schema the watched tables live in.
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Orders table name.
    #[serde(default = "default_orders_table")]
    pub orders_table: String,
    /// Chat messages table name.
    #[serde(default = "default_messages_table")]
    pub messages_table: String,
    /// REST request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            schema: default_schema(),
            orders_table: default_orders_table(),
            messages_table: default_messages_table(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_orders_table() -> String {
    "orders".to_string()
}

fn default_messages_table() -> String {
    "chat_messages".to_string()
}

fn default_request_timeout() -> u64 {
    10
}
