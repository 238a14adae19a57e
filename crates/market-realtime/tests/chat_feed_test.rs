//! Chat notifications and the global unread total end to end.

mod helpers;

use market_core::traits::SubscriptionStatus;
use market_core::types::{MessageId, OrderId};
use market_realtime::notification::chat::UNKNOWN_ORDER_NUMBER;

use helpers::{TestApp, chat_insert, chat_marked_read, chat_update_full, settle};

#[tokio::test]
async fn test_insert_then_read_update_adjusts_total() {
    let app = TestApp::started(3).await;
    assert_eq!(app.engine.chat().total_unread_messages(), 3);

    let order_id = OrderId::new();
    app.lookup.insert(order_id, "1042");
    app.feed
        .publish(chat_insert(MessageId::new(), order_id, "user", "Merhaba"))
        .await;
    assert_eq!(app.engine.chat().total_unread_messages(), 4);

    app.feed
        .publish(chat_marked_read(MessageId::new(), order_id))
        .await;
    assert_eq!(app.engine.chat().total_unread_messages(), 3);
}

#[tokio::test]
async fn test_total_never_goes_below_zero() {
    let app = TestApp::started(0).await;
    let order_id = OrderId::new();

    app.feed.publish(chat_marked_read(MessageId::new(), order_id)).await;
    app.feed.publish(chat_marked_read(MessageId::new(), order_id)).await;

    assert_eq!(app.engine.chat().total_unread_messages(), 0);
}

#[tokio::test]
async fn test_notification_carries_resolved_order_number() {
    let app = TestApp::started(0).await;
    let order_id = OrderId::new();
    app.lookup.insert(order_id, "1042");

    app.feed
        .publish(chat_insert(MessageId::new(), order_id, "user", "Siparişim nerede?"))
        .await;
    settle().await;

    let chat = app.engine.chat().notifications();
    assert_eq!(chat.len(), 1);
    assert_eq!(chat[0].order_number, "1042");
    assert_eq!(chat[0].message, "Siparişim nerede?");
    assert_eq!(
        app.toasts.messages(),
        vec!["Yeni mesaj (Sipariş #1042): Siparişim nerede?"]
    );
    assert_eq!(app.audio.plays(), vec!["/sounds/new-message.mp3"]);
}

#[tokio::test]
async fn test_lookup_failure_falls_back_to_placeholder() {
    let app = TestApp::started(0).await;
    app.lookup.set_failing(true);

    app.feed
        .publish(chat_insert(MessageId::new(), OrderId::new(), "user", "selam"))
        .await;

    let chat = app.engine.chat().notifications();
    assert_eq!(chat.len(), 1);
    assert_eq!(chat[0].order_number, UNKNOWN_ORDER_NUMBER);
    assert_eq!(app.engine.chat().total_unread_messages(), 1);
    assert_eq!(app.engine.metrics().lookup_failures, 1);
}

#[tokio::test]
async fn test_admin_messages_are_not_notified() {
    let app = TestApp::started(2).await;

    let delivered = app
        .feed
        .publish(chat_insert(MessageId::new(), OrderId::new(), "admin", "Kargoda"))
        .await;

    assert_eq!(delivered, 0);
    assert!(app.engine.chat().notifications().is_empty());
    assert_eq!(app.engine.chat().total_unread_messages(), 2);
}

#[tokio::test]
async fn test_read_update_patches_buffered_notification() {
    let app = TestApp::started(0).await;
    let (id, order_id) = (MessageId::new(), OrderId::new());
    app.lookup.insert(order_id, "5");

    app.feed.publish(chat_insert(id, order_id, "user", "?")).await;
    assert_eq!(app.engine.chat().unread_count(), 1);

    app.feed.publish(chat_marked_read(id, order_id)).await;
    assert_eq!(app.engine.chat().unread_count(), 0);
    assert_eq!(app.engine.chat().total_unread_messages(), 0);
}

#[tokio::test]
async fn test_clear_and_mark_read_leave_total_alone() {
    let app = TestApp::started(5).await;
    let id = MessageId::new();
    app.feed
        .publish(chat_insert(id, OrderId::new(), "user", "a"))
        .await;

    app.engine.chat().mark_as_read(id);
    assert_eq!(app.engine.chat().unread_count(), 0);
    assert_eq!(app.engine.chat().total_unread_messages(), 6);

    app.engine.chat().clear();
    assert!(app.engine.chat().notifications().is_empty());
    assert_eq!(app.engine.chat().total_unread_messages(), 6);
}

#[tokio::test]
async fn test_total_resyncs_after_interruption() {
    let app = TestApp::started(3).await;
    assert_eq!(app.unread.calls(), 1);

    app.unread.set(7);
    app.feed.emit_status(SubscriptionStatus::Subscribed).await;
    assert_eq!(app.engine.chat().total_unread_messages(), 3);

    app.feed
        .emit_status(SubscriptionStatus::ChannelError("socket closed".into()))
        .await;
    app.feed.emit_status(SubscriptionStatus::Subscribed).await;

    assert_eq!(app.engine.chat().total_unread_messages(), 7);
    assert_eq!(app.unread.calls(), 2);
}

#[tokio::test]
async fn test_full_old_image_only_counts_real_transitions() {
    let app = TestApp::started(4).await;
    let (id, order_id) = (MessageId::new(), OrderId::new());

    app.feed.publish(chat_update_full(id, order_id, true, true)).await;
    assert_eq!(app.engine.chat().total_unread_messages(), 4);

    app.feed.publish(chat_update_full(id, order_id, false, false)).await;
    assert_eq!(app.engine.chat().total_unread_messages(), 4);

    app.feed.publish(chat_update_full(id, order_id, false, true)).await;
    assert_eq!(app.engine.chat().total_unread_messages(), 3);
}
