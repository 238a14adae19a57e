//! Audio and toast alert configuration.

use serde::{Deserialize, Serialize};

/// Alert side-effect configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Sound played for a new order.
    #[serde(default = "default_order_sound")]
    pub order_sound: String,
    /// Sound played for a new chat message.
    #[serde(default = "default_chat_sound")]
    pub chat_sound: String,
    /// External player binary. Audio is silent when unset.
    #[serde(default)]
    pub player_command: Option<String>,
    /// How long an order toast stays visible, in seconds.
    #[serde(default = "default_order_toast")]
    pub order_toast_seconds: u64,
    /// How long a chat toast stays visible, in seconds.
    #[serde(default = "default_chat_toast")]
    pub chat_toast_seconds: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            order_sound: default_order_sound(),
            chat_sound: default_chat_sound(),
            player_command: None,
            order_toast_seconds: default_order_toast(),
            chat_toast_seconds: default_chat_toast(),
        }
    }
}

fn default_order_sound() -> String {
    "/sounds/new-order.mp3".to_string()
}

fn default_chat_sound() -> String {
    "/sounds/new-message.mp3".to_string()
}

fn default_order_toast() -> u64 {
    5
}

fn default_chat_toast() -> u64 {
    4
}
