//! Global unread chat message counter.
//!
//! Independent of any notification buffer: it mirrors the number of unread
//! customer messages in the whole dataset and never drops below zero.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

/// Saturating unread counter with change notification.
#[derive(Debug)]
pub struct UnreadCounter {
    /// Current value.
    value: AtomicU64,
    /// Publishes every new value.
    changes: watch::Sender<u64>,
}

impl UnreadCounter {
    /// Creates a counter starting at `initial`.
    pub fn new(initial: u64) -> Self {
        let (changes, _) = watch::channel(initial);
        Self {
            value: AtomicU64::new(initial),
            changes,
        }
    }

    /// Current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Replaces the value, e.g. after a fresh count query.
    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::SeqCst);
        self.publish(value);
    }

    /// Adds one. Returns the new value.
    pub fn increment(&self) -> u64 {
        let value = self.value.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        self.publish(value);
        value
    }

    /// Subtracts one, stopping at zero. Returns the new value.
    pub fn decrement(&self) -> u64 {
        let previous = self
            .value
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| Some(v.saturating_sub(1)))
            .unwrap_or(0);
        let value = previous.saturating_sub(1);
        self.publish(value);
        value
    }

    /// Receiver that observes every change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn publish(&self, value: u64) {
        self.changes.send_replace(value);
    }
}

impl Default for UnreadCounter {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_and_decrement() {
        let counter = UnreadCounter::new(3);
        assert_eq!(counter.increment(), 4);
        assert_eq!(counter.decrement(), 3);
        assert_eq!(counter.get(), 3);
    }

    #[test]
    fn test_decrement_floors_at_zero() {
        let counter = UnreadCounter::new(1);
        counter.decrement();
        counter.decrement();
        counter.decrement();
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn test_inserts_minus_reads() {
        let counter = UnreadCounter::new(2);
        for _ in 0..4 {
            counter.increment();
        }
        for _ in 0..9 {
            counter.decrement();
        }
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn test_subscribers_see_latest_value() {
        let counter = UnreadCounter::default();
        let rx = counter.subscribe();
        counter.set(7);
        counter.increment();
        assert_eq!(*rx.borrow(), 8);
    }
}
