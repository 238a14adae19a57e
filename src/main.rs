//! Deniz Market notifier: live order and chat alerts for the admin panel.
//!
//! Main entry point that wires the backend clients, the realtime feed and
//! the notification engine together and runs until interrupted.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use market_core::config::AppConfig;
use market_core::error::AppError;
use market_core::traits::AudioPlayer;
use market_realtime::alert::{CommandAudioPlayer, SilentAudioPlayer, TracingToastSurface};
use market_realtime::backend::RestBackend;
use market_realtime::{EngineCollaborators, NotificationEngine, SupabaseRealtimeFeed};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Notifier error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from `config/` files and `MARKET__*` variables
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("MARKET_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Build everything, run until a shutdown signal, tear down
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Deniz Market notifier v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Backend REST client ──────────────────────────────
    let rest = Arc::new(RestBackend::new(&config.backend)?);

    // ── Step 2: Realtime change feed ─────────────────────────────
    let feed = Arc::new(SupabaseRealtimeFeed::connect(
        &config.backend,
        &config.realtime,
    )?);

    // ── Step 3: Alert outputs ────────────────────────────────────
    let audio: Arc<dyn AudioPlayer> = match config
        .alerts
        .player_command
        .as_deref()
        .filter(|c| !c.is_empty())
    {
        Some(command) => {
            tracing::info!(command, "Audio alerts enabled");
            Arc::new(CommandAudioPlayer::new(command))
        }
        None => {
            tracing::info!("No audio player configured, alerts will be silent");
            Arc::new(SilentAudioPlayer)
        }
    };

    // ── Step 4: Notification engine ──────────────────────────────
    let engine = NotificationEngine::new(
        &config,
        EngineCollaborators {
            feed: feed.clone(),
            lookup: rest.clone(),
            unread_source: rest,
            audio,
            toasts: Arc::new(TracingToastSurface),
        },
    );

    if let Err(e) = engine.start().await {
        feed.shutdown().await;
        return Err(e);
    }

    let mut unread_total = engine.chat().watch_unread_total();
    let unread_logger = tokio::spawn(async move {
        while unread_total.changed().await.is_ok() {
            let total = *unread_total.borrow_and_update();
            tracing::info!(total, "Unread customer messages");
        }
    });

    // ── Step 5: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping notifier...");

    engine.shutdown().await;
    feed.shutdown().await;
    unread_logger.abort();

    let metrics = engine.metrics();
    tracing::info!(
        events_received = metrics.events_received,
        notifications_created = metrics.notifications_created,
        lookup_failures = metrics.lookup_failures,
        playback_failures = metrics.playback_failures,
        "Notifier stopped"
    );
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
