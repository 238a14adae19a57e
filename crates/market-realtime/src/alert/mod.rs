//! Best-effort alert side effects: audio playback and toasts.

pub mod audio;
pub mod dispatcher;
pub mod toast;

pub use audio::{CommandAudioPlayer, SilentAudioPlayer};
pub use dispatcher::AlertDispatcher;
pub use toast::{BroadcastToastSurface, TracingToastSurface};
