//! Optional hooks that let higher-level logic (handshake, world-snapshot
//! delivery) plug into the core via a one-way capability: extensions call
//! back into the connection, but the connection never holds a reference
//! back to an extension beyond its slot in the extension list.

use std::time::Instant;

use crate::catalog::Record;

/// The capability the connection exposes to an extension: never a typed
/// back-reference, only what an extension legitimately needs.
pub trait ConnectionHandle {
    fn send_record(&mut self, record: Record, reliable: bool);
    fn mtu(&self) -> usize;
    fn address(&self) -> std::net::SocketAddr;
}

/// A pluggable participant in the per-tick record flow. `now` is the same
/// tick timestamp the orchestrator received, not part of the connection
/// capability — extensions that schedule themselves (ping) need it.
pub trait Extension {
    /// Called once when the extension is attached.
    fn init(&mut self, _now: Instant, _conn: &mut dyn ConnectionHandle) {}

    /// Called once per tick, after records have been dispatched.
    fn on_tick(&mut self, _now: Instant, _conn: &mut dyn ConnectionHandle) {}

    /// Offered each freshly-received record in arrival order. Returns
    /// `true` if the extension consumed it (it will not be delivered to the
    /// connection's own RX FIFO).
    fn on_record(&mut self, _now: Instant, _conn: &mut dyn ConnectionHandle, _record: &Record) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingExtension {
        seen: usize,
    }

    impl Extension for CountingExtension {
        fn on_record(&mut self, _now: Instant, _conn: &mut dyn ConnectionHandle, record: &Record) -> bool {
            self.seen += 1;
            matches!(record, Record::Ping { .. })
        }
    }

    struct StubHandle;
    impl ConnectionHandle for StubHandle {
        fn send_record(&mut self, _record: Record, _reliable: bool) {}
        fn mtu(&self) -> usize {
            1200
        }
        fn address(&self) -> std::net::SocketAddr {
            "127.0.0.1:0".parse().unwrap()
        }
    }

    #[test]
    fn extension_can_consume_a_record() {
        let mut ext = CountingExtension { seen: 0 };
        let mut handle = StubHandle;
        let now = Instant::now();
        let consumed = ext.on_record(now, &mut handle, &Record::Ping { id: 1, ms: 1 });
        assert!(consumed);
        assert_eq!(ext.seen, 1);

        let consumed = ext.on_record(now, &mut handle, &Record::Delta(vec![]));
        assert!(!consumed);
        assert_eq!(ext.seen, 2);
    }
}
