//! Write-only diagnostic event stream.
//!
//! Every recoverable condition the core swallows instead of raising is
//! reported here instead. The stream must never back-pressure the core, so
//! `Sink::emit` takes `&self` and is expected to be cheap (a counter bump, a
//! `tracing` call, or a push onto an unbounded buffer in tests).

use crate::seq::SeqNum;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    RecordQueued { type_code: u8, size: usize },
    RecordDropped { reason: &'static str },
    RecordTooLarge { type_code: u8, size: usize },
    PacketOffered { size: usize, reliable: bool },
    PacketDropped { reason: &'static str },
    PacketPacked { rid: Option<SeqNum>, size: usize },
    FragmentDropped { reason: &'static str },
    Retransmitting { rid: SeqNum, retries: u32 },
    AckSent { base: SeqNum, mask: u16 },
    AckReceived { base: SeqNum, mask: u16 },
    PingSent { id: u16 },
    PingLost { id: u16 },
    RingEnqueueDropped { policy: &'static str },
    RingDequeued,
    DrainTimeMicros { direction: &'static str, micros: u128 },
}

/// Write-only sink for [`Event`]s. Implementations must not block or fail;
/// the core never checks a return value.
pub trait Sink {
    fn emit(&self, event: Event);
}

/// Forwards every event to `tracing` at `debug` level. The default sink for
/// production use; installing an actual subscriber is left to the binary or
/// test harness, since a library crate should never own a global
/// subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl Sink for TracingSink {
    fn emit(&self, event: Event) {
        tracing::debug!(?event, "transport event");
    }
}

/// Collects every event into a `Vec`, for tests that assert on what was
/// reported.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: std::sync::Mutex<Vec<Event>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Event> {
        std::mem::take(&mut self.events.lock().unwrap())
    }
}

impl Sink for CollectingSink {
    fn emit(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

/// Discards everything. Useful when a carrier does not want diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl Sink for NullSink {
    fn emit(&self, _event: Event) {}
}
