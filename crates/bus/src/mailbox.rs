// SPDX-License-Identifier: MIT

//! Per-agent mailbox: four FIFO bands (one per `Priority`), drained
//! highest-priority-first. Within a band, delivery is strict arrival order,
//! which is round-robin-fair across senders by construction.
//!
//! Backpressure (spec §4.C): at `SOFT_LIMIT` queued messages the oldest
//! `LOW` message is dropped to make room; at `HARD_LIMIT` new sends are
//! rejected outright with `SwarmError::Overflow`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use swarm_core::{Message, Priority, SwarmError};
use tokio::sync::Notify;

pub const SOFT_LIMIT: usize = 10_000;
pub const HARD_LIMIT: usize = 100_000;

const BANDS: usize = 4;

fn band_of(priority: Priority) -> usize {
    match priority {
        Priority::Low => 0,
        Priority::Normal => 1,
        Priority::High => 2,
        Priority::Urgent => 3,
    }
}

struct Inner {
    bands: parking_lot::Mutex<[VecDeque<Message>; BANDS]>,
    len: AtomicUsize,
    notify: Notify,
}

/// Shared handle; cheap to clone, one clone kept by the bus (for
/// enqueueing) and one by the agent's consumer task (for `recv`).
#[derive(Clone)]
pub struct Mailbox {
    inner: Arc<Inner>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                bands: parking_lot::Mutex::new([
                    VecDeque::new(),
                    VecDeque::new(),
                    VecDeque::new(),
                    VecDeque::new(),
                ]),
                len: AtomicUsize::new(0),
                notify: Notify::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueue `msg`, applying backpressure. Returns `true` if a `LOW`
    /// message was dropped to make room under the soft limit.
    pub fn enqueue(&self, msg: Message) -> Result<bool, SwarmError> {
        let mut dropped = false;
        {
            let mut bands = self.inner.bands.lock();
            let current_len = self.inner.len.load(Ordering::Acquire);
            if current_len >= HARD_LIMIT {
                return Err(SwarmError::Overflow(format!(
                    "mailbox at hard limit ({HARD_LIMIT}), rejecting message {}",
                    msg.id
                )));
            }
            if current_len >= SOFT_LIMIT {
                if let Some(low) = bands[band_of(Priority::Low)].pop_front() {
                    tracing::warn!(dropped = %low.id, "soft limit reached, dropped oldest LOW message");
                    self.inner.len.fetch_sub(1, Ordering::AcqRel);
                    dropped = true;
                }
            }
            bands[band_of(msg.priority)].push_back(msg);
        }
        self.inner.len.fetch_add(1, Ordering::AcqRel);
        self.inner.notify.notify_one();
        Ok(dropped)
    }

    /// Pop the oldest message from the highest non-empty band, if any.
    pub fn try_recv(&self) -> Option<Message> {
        let mut bands = self.inner.bands.lock();
        for band in (0..BANDS).rev() {
            if let Some(msg) = bands[band].pop_front() {
                self.inner.len.fetch_sub(1, Ordering::AcqRel);
                return Some(msg);
            }
        }
        None
    }

    /// Wait for and pop the next message, honoring priority order.
    pub async fn recv(&self) -> Message {
        loop {
            if let Some(msg) = self.try_recv() {
                return msg;
            }
            self.inner.notify.notified().await;
        }
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::{AgentId, Content, MessageType, Recipient};

    fn msg(priority: Priority) -> Message {
        Message::new(
            AgentId::new("ns", "sender"),
            Recipient::Single(AgentId::new("ns", "recv")),
            MessageType::Inform,
            priority,
            0,
            Content::new("t", serde_json::json!({})),
        )
    }

    #[test]
    fn higher_priority_drains_first() {
        let mailbox = Mailbox::new();
        mailbox.enqueue(msg(Priority::Low)).unwrap();
        mailbox.enqueue(msg(Priority::Urgent)).unwrap();
        mailbox.enqueue(msg(Priority::Normal)).unwrap();
        assert_eq!(mailbox.try_recv().unwrap().priority, Priority::Urgent);
        assert_eq!(mailbox.try_recv().unwrap().priority, Priority::Normal);
        assert_eq!(mailbox.try_recv().unwrap().priority, Priority::Low);
    }

    #[test]
    fn fifo_within_a_band() {
        let mailbox = Mailbox::new();
        let first = msg(Priority::Normal);
        let first_id = first.id.clone();
        mailbox.enqueue(first).unwrap();
        mailbox.enqueue(msg(Priority::Normal)).unwrap();
        assert_eq!(mailbox.try_recv().unwrap().id, first_id);
    }

    #[test]
    fn hard_limit_rejects_with_overflow() {
        let mailbox = Mailbox::new();
        for _ in 0..HARD_LIMIT {
            mailbox.enqueue(msg(Priority::Normal)).unwrap();
        }
        let err = mailbox.enqueue(msg(Priority::Normal)).unwrap_err();
        assert!(matches!(err, SwarmError::Overflow(_)));
    }
}
