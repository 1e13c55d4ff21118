//! Bounded FIFO with a configurable drop policy.

use std::collections::VecDeque;

use crate::config::{DropPolicy, RingBufferConfig};

/// Outcome of a [`RingBuffer::push`] that landed on a full buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Pushed,
    DroppedNewest,
    DroppedOldest,
}

/// Bounded FIFO over a `VecDeque`. `0 <= len() <= capacity` always holds;
/// under the `Newest` policy a full buffer refuses new items (preserving
/// what is already queued), under `Oldest` it evicts the head to make room
/// (preserving freshness).
#[derive(Debug)]
pub struct RingBuffer<T> {
    buf: VecDeque<T>,
    capacity: usize,
    drop_policy: DropPolicy,
}

impl<T> RingBuffer<T> {
    pub fn new(config: RingBufferConfig) -> Self {
        assert!(config.capacity > 0, "ring buffer capacity must be > 0");
        Self {
            buf: VecDeque::with_capacity(config.capacity),
            capacity: config.capacity,
            drop_policy: config.drop_policy,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&mut self, item: T) -> EnqueueOutcome {
        if self.buf.len() < self.capacity {
            self.buf.push_back(item);
            return EnqueueOutcome::Pushed;
        }

        match self.drop_policy {
            DropPolicy::Newest => EnqueueOutcome::DroppedNewest,
            DropPolicy::Oldest => {
                self.buf.pop_front();
                self.buf.push_back(item);
                EnqueueOutcome::DroppedOldest
            }
        }
    }

    pub fn pop(&mut self) -> Option<T> {
        self.buf.pop_front()
    }

    /// Puts `item` back at the head, bypassing capacity/drop-policy checks.
    /// Used to retain a datagram that hit a transient would-block on send
    /// for the next drain.
    pub fn push_front(&mut self, item: T) {
        self.buf.push_front(item);
    }
}
