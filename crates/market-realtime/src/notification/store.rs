//! Bounded live-feed store.
//!
//! Keeps the most recent notifications first, capped at a fixed capacity;
//! pushing past the cap evicts the oldest entry. The unread count is always
//! derived from the retained entries only.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use tokio::sync::watch;

/// A record that can live in a [`LiveFeedStore`].
pub trait FeedRecord: Clone + Send + Sync + 'static {
    /// Identifier type.
    type Id: Copy + Eq + fmt::Display + Send + Sync;

    /// Record identifier.
    fn id(&self) -> Self::Id;

    /// Whether the record has been acknowledged.
    fn is_read(&self) -> bool;

    /// Set the read flag.
    fn set_read(&mut self, read: bool);
}

/// Most-recent-first ring buffer of notifications.
///
/// Every mutation happens under one lock with no await point inside, so a
/// push and the unread count it implies are observed together.
#[derive(Debug)]
pub struct LiveFeedStore<T: FeedRecord> {
    /// Maximum retained entries.
    capacity: usize,
    /// Entries, newest at the front.
    entries: Mutex<VecDeque<T>>,
    /// Bumped on every mutation so UI consumers can re-read.
    version: watch::Sender<u64>,
}

impl<T: FeedRecord> LiveFeedStore<T> {
    /// Creates an empty store holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            version,
        }
    }

    /// Maximum retained entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Prepends `record`, evicting the oldest entry on overflow.
    ///
    /// Returns the evicted entry, if any.
    pub fn push(&self, record: T) -> Option<T> {
        let evicted = {
            let mut entries = self.lock();
            entries.push_front(record);
            if entries.len() > self.capacity {
                entries.pop_back()
            } else {
                None
            }
        };
        self.bump();
        evicted
    }

    /// Copy of the retained entries, newest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().iter().cloned().collect()
    }

    /// Number of retained entries that are unread.
    pub fn unread_count(&self) -> usize {
        self.lock().iter().filter(|r| !r.is_read()).count()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether an entry with `id` is retained.
    pub fn contains(&self, id: T::Id) -> bool {
        self.lock().iter().any(|r| r.id() == id)
    }

    /// Marks one entry read. Returns `false` if `id` is not retained or already read.
    pub fn mark_as_read(&self, id: T::Id) -> bool {
        self.set_read(id, true)
    }

    /// Marks every retained entry read. Returns how many flipped.
    pub fn mark_all_as_read(&self) -> usize {
        let flipped = {
            let mut entries = self.lock();
            let mut flipped = 0;
            for record in entries.iter_mut().filter(|r| !r.is_read()) {
                record.set_read(true);
                flipped += 1;
            }
            flipped
        };
        if flipped > 0 {
            self.bump();
        }
        flipped
    }

    /// Sets the read flag of the entry with `id`.
    ///
    /// Returns `true` only if the flag changed; listeners are notified only then.
    pub fn set_read(&self, id: T::Id, read: bool) -> bool {
        let changed = {
            let mut entries = self.lock();
            match entries.iter_mut().find(|r| r.id() == id) {
                Some(record) if record.is_read() != read => {
                    record.set_read(read);
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.bump();
        }
        changed
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.lock().clear();
        self.bump();
    }

    /// Receiver that changes whenever the store is mutated.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<T>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }
}
