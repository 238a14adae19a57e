//! Suppression of replayed inserts.
//!
//! After a rejoin the realtime server can deliver an insert that was already
//! handled on the previous connection. A replay must not toast, sound or
//! count a second time, so each pipeline remembers the row keys it handled
//! recently and drops any key seen again before the window runs out.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Remembered keys before stale ones are swept.
const SWEEP_THRESHOLD: usize = 1024;

/// Recently handled row keys with the instant each was handled.
#[derive(Debug)]
pub struct EventDeduplicator {
    /// How long a handled key suppresses replays
    window: Duration,
    /// Key -> when it was handled
    handled: Mutex<HashMap<String, Instant>>,
}

impl EventDeduplicator {
    /// Suppress replays for `window_ms` after first delivery. Zero disables suppression.
    pub fn new(window_ms: u64) -> Self {
        Self {
            window: Duration::from_millis(window_ms),
            handled: Mutex::new(HashMap::new()),
        }
    }

    /// Records `key` and reports whether this delivery is new.
    ///
    /// A replay inside the window returns `false` and does not extend it.
    pub fn should_process(&self, key: &str) -> bool {
        let mut handled = self.handled.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        let replayed = handled
            .get(key)
            .is_some_and(|at| now.duration_since(*at) < self.window);
        if replayed {
            return false;
        }

        if handled.len() >= SWEEP_THRESHOLD {
            let window = self.window;
            handled.retain(|_, at| now.duration_since(*at) < window);
        }

        handled.insert(key.to_string(), now);
        true
    }

    /// `table:KIND:row-id`
    pub fn make_key(table: &str, kind: &str, record_id: &str) -> String {
        format!("{table}:{kind}:{record_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_inside_window_is_dropped() {
        let dedup = EventDeduplicator::new(60_000);
        let key = EventDeduplicator::make_key("orders", "INSERT", "1");
        assert!(dedup.should_process(&key));
        assert!(!dedup.should_process(&key));
        assert!(dedup.should_process("orders:INSERT:2"));
    }

    #[test]
    fn test_zero_window_never_drops() {
        let dedup = EventDeduplicator::new(0);
        assert!(dedup.should_process("k"));
        assert!(dedup.should_process("k"));
    }

    #[test]
    fn test_sweep_keeps_live_keys() {
        let dedup = EventDeduplicator::new(60_000);
        for i in 0..SWEEP_THRESHOLD + 5 {
            assert!(dedup.should_process(&format!("chat_messages:INSERT:{i}")));
        }
        assert!(!dedup.should_process("chat_messages:INSERT:0"));
    }
}
