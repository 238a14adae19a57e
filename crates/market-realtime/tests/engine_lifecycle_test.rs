//! Engine start/shutdown behavior.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use market_core::config::AppConfig;
use market_core::error::ErrorKind;
use market_core::traits::ChangeFeed;
use market_core::types::OrderId;
use market_realtime::alert::CommandAudioPlayer;
use market_realtime::{EngineCollaborators, MemoryChangeFeed, NotificationEngine};

use helpers::{FakeLookup, FakeUnreadSource, RecordingToasts, TestApp, order_insert, settle};

#[tokio::test]
async fn test_start_registers_three_subscriptions() {
    let app = TestApp::started(0).await;
    assert!(app.engine.is_running());
    assert_eq!(app.feed.active_subscriptions(), 3);
}

#[tokio::test]
async fn test_second_start_conflicts() {
    let app = TestApp::started(0).await;

    let err = app.engine.start().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(app.feed.active_subscriptions(), 3);
}

#[tokio::test]
async fn test_shutdown_unsubscribes_and_releases_audio() {
    let app = TestApp::started(0).await;

    app.engine.shutdown().await;
    assert!(!app.engine.is_running());
    assert_eq!(app.feed.active_subscriptions(), 0);
    assert!(app.audio.is_released());

    let delivered = app.feed.publish(order_insert(OrderId::new(), "1", 1.0)).await;
    assert_eq!(delivered, 0);

    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_restart_after_shutdown() {
    let app = TestApp::started(0).await;
    app.engine.shutdown().await;

    app.engine.start().await.unwrap();
    assert_eq!(app.feed.active_subscriptions(), 3);
}

#[tokio::test]
async fn test_unread_count_failure_does_not_prevent_start() {
    let app = TestApp::new(9);
    app.unread.set_failing(true);

    app.engine.start().await.unwrap();
    assert_eq!(app.engine.chat().total_unread_messages(), 0);
    assert!(app.engine.is_running());
}

#[tokio::test]
async fn test_restart_rearms_audio() {
    let app = TestApp::started(0).await;
    app.engine.shutdown().await;
    assert!(app.audio.is_released());

    app.engine.start().await.unwrap();
    assert!(!app.audio.is_released());
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_player_plays_after_restart() {
    let feed = Arc::new(MemoryChangeFeed::new());
    let engine = NotificationEngine::new(
        &AppConfig::default(),
        EngineCollaborators {
            feed: feed.clone(),
            lookup: Arc::new(FakeLookup::default()),
            unread_source: Arc::new(FakeUnreadSource::default()),
            audio: Arc::new(CommandAudioPlayer::new("true")),
            toasts: Arc::new(RecordingToasts::default()),
        },
    );

    engine.start().await.unwrap();
    engine.shutdown().await;
    engine.start().await.unwrap();

    feed.publish(order_insert(OrderId::new(), "77", 12.5)).await;
    settle().await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let metrics = engine.metrics();
    assert_eq!(metrics.notifications_created, 1);
    assert_eq!(metrics.playback_failures, 0);
}
