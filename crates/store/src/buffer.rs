// SPDX-License-Identifier: MIT

//! Bounded in-memory ring of recorded events awaiting a flush to the WAL.
//! Per spec §4.B: capacity defaults to 100; a flush is triggered when the
//! ring is full, on a periodic timer (driven by the owning store, not this
//! type), or on an explicit call (`getEvents`/`shutdown`). If the flush
//! callback fails, the events are prepended back so nothing is lost.

use std::collections::VecDeque;
use swarm_core::Event;

pub const DEFAULT_CAPACITY: usize = 100;

pub struct EventBuffer {
    capacity: usize,
    ring: VecDeque<Event>,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, ring: VecDeque::with_capacity(capacity) }
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ring.len() >= self.capacity
    }

    /// Push `event`. Returns `true` if the ring is now at or over capacity
    /// and a flush should be triggered by the caller.
    pub fn push(&mut self, event: Event) -> bool {
        self.ring.push_back(event);
        self.is_full()
    }

    /// Remove and return all buffered events in insertion order, leaving
    /// the ring empty.
    pub fn drain(&mut self) -> Vec<Event> {
        self.ring.drain(..).collect()
    }

    /// Put events back at the front, in their original order, because a
    /// flush attempt failed. Oldest-first ordering is preserved so a
    /// subsequent successful flush still applies events in the order they
    /// were recorded.
    pub fn prepend_back(&mut self, events: Vec<Event>) {
        for event in events.into_iter().rev() {
            self.ring.push_front(event);
        }
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::EventId;

    fn event(n: u64) -> Event {
        Event {
            id: EventId::new(),
            instance_id: "inst-1".into(),
            kind: "k".into(),
            payload: serde_json::json!({"n": n}),
            timestamp_epoch_ms: n,
            node_id: None,
        }
    }

    #[test]
    fn push_signals_full_at_capacity() {
        let mut buf = EventBuffer::new(2);
        assert!(!buf.push(event(1)));
        assert!(buf.push(event(2)));
    }

    #[test]
    fn drain_empties_ring_in_order() {
        let mut buf = EventBuffer::new(10);
        buf.push(event(1));
        buf.push(event(2));
        let drained = buf.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].timestamp_epoch_ms, 1);
        assert_eq!(drained[1].timestamp_epoch_ms, 2);
        assert!(buf.is_empty());
    }

    #[test]
    fn prepend_back_restores_order_after_failed_flush() {
        let mut buf = EventBuffer::new(10);
        buf.push(event(3));
        let drained = vec![event(1), event(2)];
        buf.prepend_back(drained);
        let all = buf.drain();
        assert_eq!(all.iter().map(|e| e.timestamp_epoch_ms).collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
