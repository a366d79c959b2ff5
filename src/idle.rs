use indexmap::IndexMap;
use std::time::{Duration, Instant};

use crate::registry::ConnectionId;

/// Tracks the last-active time of every connection in touch order, so the
/// oldest entry is always at index 0. Built the same way the teacher's
/// `plus::ttl_cache::TtlCache` orders its entries (an `IndexMap` touched via
/// `shift_remove` + reinsert to move an entry to the MRU end), generalized
/// from TTL-since-insert to last-active timestamp: every dispatch touches
/// its connection, not just cache reads.
#[derive(Default)]
pub struct IdleTracker {
    entries: IndexMap<ConnectionId, Instant>,
}

impl IdleTracker {
    pub fn new() -> IdleTracker {
        IdleTracker {
            entries: IndexMap::new(),
        }
    }

    /// Records activity for `id`, moving it to the most-recently-used end.
    pub fn touch(&mut self, id: &ConnectionId, now: Instant) {
        self.entries.shift_remove(id);
        self.entries.insert(id.clone(), now);
    }

    pub fn remove(&mut self, id: &ConnectionId) {
        self.entries.shift_remove(id);
    }

    /// The least-recently-active entry, without removing it.
    pub fn peek_oldest(&self) -> Option<(&ConnectionId, Instant)> {
        self.entries.get_index(0).map(|(id, &last_active)| (id, last_active))
    }

    /// Pops the single oldest entry, unconditionally. Callers check
    /// `peek_oldest` against `max_idle` first; the amortized scan in §4.8
    /// reaps at most one connection per poll, so this never drains more
    /// than one entry at a time.
    pub fn pop_oldest(&mut self) -> Option<ConnectionId> {
        self.entries.shift_remove_index(0).map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn peek_oldest_returns_least_recently_active() {
        let mut tracker = IdleTracker::new();
        let base = Instant::now();

        tracker.touch(&ConnectionId::from("a"), base);
        tracker.touch(&ConnectionId::from("b"), base + Duration::from_secs(1));

        let (id, last_active) = tracker.peek_oldest().unwrap();
        assert_eq!(id, &ConnectionId::from("a"));
        assert_eq!(last_active, base);

        let popped = tracker.pop_oldest().unwrap();
        assert_eq!(popped, ConnectionId::from("a"));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn touch_moves_entry_to_mru_end() {
        let mut tracker = IdleTracker::new();
        let base = Instant::now();

        tracker.touch(&ConnectionId::from("a"), base);
        tracker.touch(&ConnectionId::from("b"), base + Duration::from_secs(1));
        tracker.touch(&ConnectionId::from("a"), base + Duration::from_secs(2));

        // "a" was re-touched last, so "b" is now the oldest entry.
        let (id, _) = tracker.peek_oldest().unwrap();
        assert_eq!(id, &ConnectionId::from("b"));
    }

    #[test]
    fn remove_drops_an_entry_without_expiring_it() {
        let mut tracker = IdleTracker::new();
        let base = Instant::now();
        tracker.touch(&ConnectionId::from("a"), base);
        tracker.remove(&ConnectionId::from("a"));
        assert!(tracker.is_empty());
    }
}
