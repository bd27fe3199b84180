//! Cancellable timer queue driven by the arena clock
//!
//! Every deferred action (supply flicker/removal, identity expiry, thrown
//! attachment grace) is an entry here instead of a detached sleep, so the
//! owner decides when timers fire and tests can step time explicitly.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use hashbrown::HashMap;

/// Handle returned by [`TimerQueue::schedule`], used to cancel an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// Min-heap of `(due_ms, seq)` with lazily deleted cancelled entries
#[derive(Debug)]
pub struct TimerQueue<T> {
    heap: BinaryHeap<Reverse<(u64, u64)>>,
    entries: HashMap<u64, T>,
    next_seq: u64,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            entries: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Schedule `payload` to fire once the clock reaches `due_ms`
    pub fn schedule(&mut self, due_ms: u64, payload: T) -> TimerHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse((due_ms, seq)));
        self.entries.insert(seq, payload);
        TimerHandle(seq)
    }

    /// Cancel a pending entry. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.entries.remove(&handle.0).is_some()
    }

    /// Whether the entry is still waiting to fire
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.entries.contains_key(&handle.0)
    }

    /// Pop every live entry due at or before `now_ms`, in due order
    pub fn poll(&mut self, now_ms: u64) -> Vec<T> {
        let mut fired = Vec::new();
        while let Some(Reverse((due, seq))) = self.heap.peek().copied() {
            if due > now_ms {
                break;
            }
            self.heap.pop();
            // Cancelled entries were removed from the map; skip their heap slot
            if let Some(payload) = self.entries.remove(&seq) {
                fired.push(payload);
            }
        }

        // Keep the heap from growing without bound under heavy cancellation
        if self.heap.len() > 64 && self.heap.len() > self.entries.len() * 4 {
            let entries = &self.entries;
            self.heap.retain(|Reverse((_, seq))| entries.contains_key(seq));
        }

        fired
    }

    /// Number of live (non-cancelled, not yet fired) entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Due time of the earliest heap slot, cancelled or not
    pub fn next_due(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse((due, _))| *due)
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_in_due_order() {
        let mut timers = TimerQueue::new();
        timers.schedule(300, "c");
        timers.schedule(100, "a");
        timers.schedule(200, "b");

        assert!(timers.poll(50).is_empty());
        assert_eq!(timers.poll(250), vec!["a", "b"]);
        assert_eq!(timers.poll(1000), vec!["c"]);
        assert!(timers.is_empty());
    }

    #[test]
    fn test_ties_fire_in_schedule_order() {
        let mut timers = TimerQueue::new();
        timers.schedule(100, 1);
        timers.schedule(100, 2);
        timers.schedule(100, 3);

        assert_eq!(timers.poll(100), vec![1, 2, 3]);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut timers = TimerQueue::new();
        let handle = timers.schedule(100, "expire");

        assert!(timers.is_pending(handle));
        assert!(timers.cancel(handle));
        assert!(!timers.cancel(handle));
        assert!(!timers.is_pending(handle));
        assert!(timers.poll(500).is_empty());
    }

    #[test]
    fn test_cancel_after_fire_returns_false() {
        let mut timers = TimerQueue::new();
        let handle = timers.schedule(10, ());
        assert_eq!(timers.poll(10).len(), 1);
        assert!(!timers.cancel(handle));
    }

    #[test]
    fn test_heap_compaction_keeps_live_entries() {
        let mut timers = TimerQueue::new();
        let handles: Vec<_> = (0..200).map(|i| timers.schedule(1_000 + i, i)).collect();
        for handle in &handles[..190] {
            timers.cancel(*handle);
        }

        assert!(timers.poll(0).is_empty());
        assert_eq!(timers.len(), 10);
        let fired = timers.poll(10_000);
        assert_eq!(fired, (190..200).collect::<Vec<_>>());
    }
}
