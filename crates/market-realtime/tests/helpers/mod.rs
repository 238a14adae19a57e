//! Shared fakes and fixtures for pipeline integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use market_core::config::AppConfig;
use market_core::error::AppError;
use market_core::events::ChangeEvent;
use market_core::traits::{AudioPlayer, OrderLookup, Toast, ToastSurface, UnreadMessageSource};
use market_core::types::{MessageId, OrderId};
use market_realtime::{EngineCollaborators, MemoryChangeFeed, NotificationEngine};

/// Order-number lookup backed by a map.
#[derive(Default)]
pub struct FakeLookup {
    numbers: Mutex<HashMap<OrderId, String>>,
    failing: AtomicBool,
}

impl FakeLookup {
    pub fn insert(&self, id: OrderId, number: &str) {
        self.numbers.lock().unwrap().insert(id, number.to_string());
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderLookup for FakeLookup {
    async fn order_number(&self, order_id: OrderId) -> Result<String, AppError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::external("orders endpoint unavailable"));
        }
        self.numbers
            .lock()
            .unwrap()
            .get(&order_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("order {order_id}")))
    }
}

/// Unread count source with a settable value.
#[derive(Default)]
pub struct FakeUnreadSource {
    count: AtomicU64,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakeUnreadSource {
    pub fn set(&self, count: u64) {
        self.count.store(count, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UnreadMessageSource for FakeUnreadSource {
    async fn unread_message_count(&self) -> Result<u64, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::external("count query failed"));
        }
        Ok(self.count.load(Ordering::SeqCst))
    }
}

/// Audio player that records what it was asked to play.
#[derive(Default)]
pub struct RecordingAudio {
    plays: Mutex<Vec<String>>,
    failing: AtomicBool,
    released: AtomicBool,
}

impl RecordingAudio {
    pub fn plays(&self) -> Vec<String> {
        self.plays.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioPlayer for RecordingAudio {
    async fn play(&self, source: &str) -> Result<(), AppError> {
        self.plays.lock().unwrap().push(source.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::playback("autoplay blocked"));
        }
        Ok(())
    }

    async fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    async fn rearm(&self) {
        self.released.store(false, Ordering::SeqCst);
    }
}

/// Toast surface that keeps every toast.
#[derive(Default)]
pub struct RecordingToasts {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingToasts {
    pub fn messages(&self) -> Vec<String> {
        self.toasts.lock().unwrap().iter().map(|t| t.message.clone()).collect()
    }
}

impl ToastSurface for RecordingToasts {
    fn show(&self, toast: Toast) {
        self.toasts.lock().unwrap().push(toast);
    }
}

/// Engine wired to an in-memory feed and recording fakes.
pub struct TestApp {
    pub engine: NotificationEngine,
    pub feed: Arc<MemoryChangeFeed>,
    pub lookup: Arc<FakeLookup>,
    pub unread: Arc<FakeUnreadSource>,
    pub audio: Arc<RecordingAudio>,
    pub toasts: Arc<RecordingToasts>,
}

impl TestApp {
    /// Build an engine whose unread source reports `initial_unread`.
    pub fn new(initial_unread: u64) -> Self {
        let feed = Arc::new(MemoryChangeFeed::new());
        let lookup = Arc::new(FakeLookup::default());
        let unread = Arc::new(FakeUnreadSource::default());
        unread.set(initial_unread);
        let audio = Arc::new(RecordingAudio::default());
        let toasts = Arc::new(RecordingToasts::default());

        let engine = NotificationEngine::new(
            &AppConfig::default(),
            EngineCollaborators {
                feed: feed.clone(),
                lookup: lookup.clone(),
                unread_source: unread.clone(),
                audio: audio.clone(),
                toasts: toasts.clone(),
            },
        );

        Self {
            engine,
            feed,
            lookup,
            unread,
            audio,
            toasts,
        }
    }

    /// Build and start.
    pub async fn started(initial_unread: u64) -> Self {
        let app = Self::new(initial_unread);
        app.engine.start().await.expect("engine should start");
        app
    }
}

/// Let spawned alert tasks run.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub fn order_insert(id: OrderId, number: &str, total: f64) -> ChangeEvent {
    ChangeEvent::insert(
        "orders",
        json!({
            "id": id,
            "order_number": number,
            "total_amount": total,
            "created_at": "2025-03-01T10:00:00Z",
        }),
    )
}

pub fn chat_insert(id: MessageId, order_id: OrderId, sender: &str, message: &str) -> ChangeEvent {
    ChangeEvent::insert(
        "chat_messages",
        json!({
            "id": id,
            "order_id": order_id,
            "sender_type": sender,
            "message": message,
            "is_read": false,
            "created_at": "2025-03-01T10:05:00Z",
        }),
    )
}

/// Update marking a user message read, with a key-only old image.
pub fn chat_marked_read(id: MessageId, order_id: OrderId) -> ChangeEvent {
    ChangeEvent::update(
        "chat_messages",
        json!({
            "id": id,
            "order_id": order_id,
            "sender_type": "user",
            "message": "tamam",
            "is_read": true,
        }),
        Some(json!({ "id": id })),
    )
}

/// Update of a user message with a full old image (replica identity full).
pub fn chat_update_full(id: MessageId, order_id: OrderId, was_read: bool, is_read: bool) -> ChangeEvent {
    let row = |read: bool| {
        json!({
            "id": id,
            "order_id": order_id,
            "sender_type": "user",
            "message": "tamam",
            "is_read": read,
            "created_at": "2025-03-01T10:05:00Z",
        })
    };
    ChangeEvent::update("chat_messages", row(is_read), Some(row(was_read)))
}
