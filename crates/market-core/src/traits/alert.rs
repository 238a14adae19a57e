//! Alert side-effect surfaces: audio playback and toasts.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::result::AppResult;

/// Plays a sound. Failures are reported but never fatal to callers.
#[async_trait]
pub trait AudioPlayer: Send + Sync + 'static {
    /// Play the media at `source` to completion (or failure).
    async fn play(&self, source: &str) -> AppResult<()>;

    /// Release any held audio resource. Called on teardown.
    async fn release(&self) {}

    /// Make a released player usable again. Called on every start.
    async fn rearm(&self) {}
}

/// Lead icon shown on a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastIcon {
    /// Shopping bag, used for new orders.
    Order,
    /// Speech bubble, used for chat messages.
    Message,
}

/// A short-lived user-visible message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    /// Lead icon.
    pub icon: ToastIcon,
    /// Message text.
    pub message: String,
    /// How long the toast stays visible.
    pub duration: Duration,
}

/// Displays toasts. Fire-and-forget: nothing is returned.
pub trait ToastSurface: Send + Sync + 'static {
    /// Show a toast.
    fn show(&self, toast: Toast);
}
