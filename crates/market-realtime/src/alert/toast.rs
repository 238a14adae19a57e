//! Toast surfaces.

use tokio::sync::broadcast;
use tracing::info;

use market_core::traits::{Toast, ToastSurface};

/// Writes toasts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingToastSurface;

impl ToastSurface for TracingToastSurface {
    fn show(&self, toast: Toast) {
        info!(
            icon = ?toast.icon,
            duration_ms = toast.duration.as_millis() as u64,
            "{}",
            toast.message
        );
    }
}

/// Publishes toasts to any number of UI listeners.
#[derive(Debug, Clone)]
pub struct BroadcastToastSurface {
    /// Toast sender
    tx: broadcast::Sender<Toast>,
}

impl BroadcastToastSurface {
    /// Create a surface buffering up to `buffer_size` undelivered toasts per listener
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size.max(1));
        Self { tx }
    }

    /// Subscribe to toasts shown from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Toast> {
        self.tx.subscribe()
    }
}

impl ToastSurface for BroadcastToastSurface {
    fn show(&self, toast: Toast) {
        // No listener is not an error: toasts are ephemeral.
        let _ = self.tx.send(toast);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use market_core::traits::ToastIcon;

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let surface = BroadcastToastSurface::new(8);
        let mut rx = surface.subscribe();
        surface.show(Toast {
            icon: ToastIcon::Order,
            message: "Yeni sipariş!".to_string(),
            duration: Duration::from_secs(5),
        });
        let toast = rx.recv().await.unwrap();
        assert_eq!(toast.message, "Yeni sipariş!");
    }

    #[test]
    fn test_broadcast_without_listeners_is_silent() {
        let surface = BroadcastToastSurface::new(1);
        surface.show(Toast {
            icon: ToastIcon::Message,
            message: "x".to_string(),
            duration: Duration::from_secs(1),
        });
    }
}
