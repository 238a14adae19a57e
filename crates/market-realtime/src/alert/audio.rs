//! Audio players.

use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use market_core::error::AppError;
use market_core::traits::AudioPlayer;

/// Plays nothing. Used when no player is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAudioPlayer;

#[async_trait]
impl AudioPlayer for SilentAudioPlayer {
    async fn play(&self, source: &str) -> Result<(), AppError> {
        debug!(source = %source, "Audio disabled, skipping playback");
        Ok(())
    }
}

/// Plays sounds by running an external player binary on the source path.
///
/// Each playback is a child process. [`AudioPlayer::release`] stops any
/// playback still running and makes later calls fail until
/// [`AudioPlayer::rearm`].
#[derive(Debug)]
pub struct CommandAudioPlayer {
    /// Player binary, e.g. `paplay` or `afplay`
    command: String,
    /// Cancelled on release, replaced on rearm
    released: Mutex<CancellationToken>,
}

impl CommandAudioPlayer {
    /// Create a player that runs `command <source>`
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            released: Mutex::new(CancellationToken::new()),
        }
    }

    fn token(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.released.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl AudioPlayer for CommandAudioPlayer {
    async fn play(&self, source: &str) -> Result<(), AppError> {
        let released = self.token().clone();
        if released.is_cancelled() {
            return Err(AppError::playback("Audio player already released"));
        }

        let mut child = Command::new(&self.command)
            .arg(source)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AppError::with_source(
                    market_core::error::ErrorKind::Playback,
                    format!("Failed to start '{}': {e}", self.command),
                    e,
                )
            })?;

        tokio::select! {
            _ = released.cancelled() => {
                let _ = child.kill().await;
                Err(AppError::playback("Playback stopped by release"))
            }
            status = child.wait() => {
                let status = status?;
                if status.success() {
                    Ok(())
                } else {
                    Err(AppError::playback(format!(
                        "'{}' exited with {status} for {source}",
                        self.command
                    )))
                }
            }
        }
    }

    async fn release(&self) {
        self.token().cancel();
    }

    async fn rearm(&self) {
        let mut token = self.token();
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::error::ErrorKind;

    #[tokio::test]
    async fn test_silent_player_always_succeeds() {
        assert!(SilentAudioPlayer.play("/sounds/new-order.mp3").await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_binary_is_playback_error() {
        let player = CommandAudioPlayer::new("definitely-not-a-real-audio-player-binary");
        let err = player.play("/sounds/new-order.mp3").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Playback);
    }

    #[tokio::test]
    async fn test_released_player_refuses_playback() {
        let player = CommandAudioPlayer::new("true");
        player.release().await;
        let err = player.play("/sounds/new-order.mp3").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Playback);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rearmed_player_plays_again() {
        let player = CommandAudioPlayer::new("true");
        player.release().await;
        player.rearm().await;
        assert!(player.play("/sounds/new-order.mp3").await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_release_stops_running_playback() {
        let player = std::sync::Arc::new(CommandAudioPlayer::new("sleep"));
        let playing = {
            let player = player.clone();
            tokio::spawn(async move { player.play("5").await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        player.release().await;

        let err = playing.await.unwrap().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Playback);
    }
}
