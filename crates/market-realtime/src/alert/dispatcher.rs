//! Alert dispatcher: one toast and one sound per notification.

use std::sync::Arc;

use tracing::{trace, warn};

use market_core::traits::{AudioPlayer, Toast, ToastSurface};

use crate::metrics::FeedMetrics;

/// Fires toasts and sounds without ever reporting failure to the caller.
pub struct AlertDispatcher {
    /// Sound output
    audio: Arc<dyn AudioPlayer>,
    /// Toast output
    toasts: Arc<dyn ToastSurface>,
    /// Shared metrics
    metrics: Arc<FeedMetrics>,
}

impl std::fmt::Debug for AlertDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertDispatcher").finish()
    }
}

impl AlertDispatcher {
    /// Create a new dispatcher
    pub fn new(
        audio: Arc<dyn AudioPlayer>,
        toasts: Arc<dyn ToastSurface>,
        metrics: Arc<FeedMetrics>,
    ) -> Self {
        Self {
            audio,
            toasts,
            metrics,
        }
    }

    /// Show `toast` and start playing `sound` in the background.
    ///
    /// Returns immediately. Playback errors are logged and counted.
    pub fn alert(&self, toast: Toast, sound: &str) {
        self.toasts.show(toast);
        self.metrics.record_toast();
        self.play(sound);
    }

    /// Start playing `sound` in the background.
    pub fn play(&self, sound: &str) {
        let audio = Arc::clone(&self.audio);
        let metrics = Arc::clone(&self.metrics);
        let sound = sound.to_string();

        tokio::spawn(async move {
            match audio.play(&sound).await {
                Ok(()) => trace!(sound = %sound, "Alert sound played"),
                Err(e) => {
                    metrics.record_playback_failure();
                    warn!(sound = %sound, error = %e, "Alert sound playback failed");
                }
            }
        });
    }

    /// Release the audio resource.
    pub async fn release(&self) {
        self.audio.release().await;
    }

    /// Make the audio resource usable again after a release.
    pub async fn rearm(&self) {
        self.audio.rearm().await;
    }
}
