//! Per-tick orchestration gluing every other component together. This is
//! the only module allowed to see all of the others; everything else is
//! composable in isolation.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use packable::Packable;

use crate::ackmask::{expand_ack, AckMask};
use crate::catalog::Record;
use crate::config::{ConnectionConfig, DefragConfig, EndpointConfig, ResendConfig};
use crate::envelope::{EnvelopeBuilder, EnvelopeOpener};
use crate::error::TransportError;
use crate::events::{Event, Sink};
use crate::extension::{ConnectionHandle, Extension};
use crate::fragment_engine::{Defragmenter, Fragmenter};
use crate::resend::ResendQueue;
use crate::seq::SeqCounter;
use crate::udp_endpoint::UdpEndpoint;
use crate::wire::{PacketFlags, PacketHeader, PACKET_HEADER_SIZE};

/// Routes a record to the envelope builder, or to the fragmenter (and the
/// pending-fragment output queue) when it alone exceeds the MTU budget.
fn offer_record(
    builder: &mut EnvelopeBuilder,
    fragmenter: &mut Fragmenter,
    mtu: usize,
    sink: &Arc<dyn Sink>,
    pending_fragments: &mut Vec<(Vec<u8>, bool)>,
    record: Record,
    reliable: bool,
) {
    sink.emit(Event::RecordQueued {
        type_code: record.type_code(),
        size: 0,
    });
    match builder.add(&record, reliable) {
        Ok(()) => {}
        Err(TransportError::RecordTooLarge { size, .. }) => {
            sink.emit(Event::RecordTooLarge {
                type_code: record.type_code(),
                size,
            });
            let encoded = record.encode(reliable);
            match fragmenter.fragment(&encoded, mtu) {
                Ok(fragments) => {
                    for fragment in fragments {
                        pending_fragments.push((fragment, reliable));
                    }
                }
                Err(_) => {
                    sink.emit(Event::RecordDropped {
                        reason: "mtu too small to fragment",
                    });
                }
            }
        }
        Err(_) => {
            sink.emit(Event::RecordDropped {
                reason: "record encode failure",
            });
        }
    }
}

struct Handle<'a> {
    builder: &'a mut EnvelopeBuilder,
    fragmenter: &'a mut Fragmenter,
    pending_fragments: &'a mut Vec<(Vec<u8>, bool)>,
    mtu: usize,
    local_addr: SocketAddr,
    sink: &'a Arc<dyn Sink>,
}

impl ConnectionHandle for Handle<'_> {
    fn send_record(&mut self, record: Record, reliable: bool) {
        offer_record(
            self.builder,
            self.fragmenter,
            self.mtu,
            self.sink,
            self.pending_fragments,
            record,
            reliable,
        );
    }

    fn mtu(&self) -> usize {
        self.mtu
    }

    fn address(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Single-threaded, cooperative reliable-unordered-datagram connection.
pub struct ReliableConnection {
    endpoint: UdpEndpoint,
    builder: EnvelopeBuilder,
    fragmenter: Fragmenter,
    defragmenter: Defragmenter,
    ack_mask: AckMask,
    resend: ResendQueue,
    seq_counter: SeqCounter,
    rid_counter: SeqCounter,
    rx_fifo: VecDeque<Record>,
    pending_fragments: Vec<(Vec<u8>, bool)>,
    extensions: Vec<Box<dyn Extension>>,
    sink: Arc<dyn Sink>,
    mtu: usize,
    local_addr: SocketAddr,
}

impl ReliableConnection {
    pub fn new(
        endpoint_config: EndpointConfig,
        connection_config: ConnectionConfig,
        resend_config: ResendConfig,
        defrag_config: DefragConfig,
        sink: Arc<dyn Sink>,
    ) -> Result<Self, TransportError> {
        if connection_config.mtu <= crate::wire::FRAGMENT_HEADER_SIZE {
            return Err(TransportError::InvalidMtu {
                mtu: connection_config.mtu,
                header_size: crate::wire::FRAGMENT_HEADER_SIZE,
            });
        }
        let endpoint = UdpEndpoint::bind(endpoint_config, Arc::clone(&sink))?;
        let local_addr = endpoint.local_addr()?;
        let envelope_budget = connection_config.mtu.saturating_sub(PACKET_HEADER_SIZE);
        Ok(Self {
            endpoint,
            builder: EnvelopeBuilder::new(envelope_budget),
            fragmenter: Fragmenter::new(),
            defragmenter: Defragmenter::new(defrag_config),
            ack_mask: AckMask::new(connection_config.ack_bits),
            resend: ResendQueue::new(resend_config),
            seq_counter: SeqCounter::new(),
            rid_counter: SeqCounter::new(),
            rx_fifo: VecDeque::new(),
            pending_fragments: Vec::new(),
            extensions: Vec::new(),
            sink,
            mtu: connection_config.mtu,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Redirects the connection's remote peer, e.g. once a rendezvous step
    /// has revealed the peer's actual post-bind address.
    pub fn reconnect_to(&mut self, addr: SocketAddr) -> std::io::Result<()> {
        self.endpoint.connect(addr)
    }

    pub fn resend_queue_len(&self) -> usize {
        self.resend.len()
    }

    pub fn ack_mask_initialized(&self) -> bool {
        self.ack_mask.is_initialized()
    }

    pub fn ack_mask_base(&self) -> crate::seq::SeqNum {
        self.ack_mask.base_seq()
    }

    /// Overrides the next `rid` to be allocated, for tests that need a
    /// deterministic starting reliable id.
    pub fn set_next_rid(&mut self, value: u16) {
        self.rid_counter = SeqCounter::starting_at(value);
    }

    pub fn add_extension(&mut self, mut extension: Box<dyn Extension>, now: Instant) {
        let mut handle = Handle {
            builder: &mut self.builder,
            fragmenter: &mut self.fragmenter,
            pending_fragments: &mut self.pending_fragments,
            mtu: self.mtu,
            local_addr: self.local_addr,
            sink: &self.sink,
        };
        extension.init(now, &mut handle);
        self.extensions.push(extension);
    }

    /// Appends `record` to the outgoing builder (or hands it to the
    /// fragmenter if it alone exceeds the MTU budget).
    pub fn send_record(&mut self, record: Record, reliable: bool) {
        offer_record(
            &mut self.builder,
            &mut self.fragmenter,
            self.mtu,
            &self.sink,
            &mut self.pending_fragments,
            record,
            reliable,
        );
    }

    pub fn recv_record(&mut self) -> Option<Record> {
        self.rx_fifo.pop_front()
    }

    pub fn recv_all(&mut self) -> Vec<Record> {
        std::mem::take(&mut self.rx_fifo).into_iter().collect()
    }

    pub fn close(self) {
        drop(self.endpoint);
    }

    fn dispatch_incoming(&mut self, now: Instant, record: Record) {
        let mut handle = Handle {
            builder: &mut self.builder,
            fragmenter: &mut self.fragmenter,
            pending_fragments: &mut self.pending_fragments,
            mtu: self.mtu,
            local_addr: self.local_addr,
            sink: &self.sink,
        };

        let mut consumed = false;
        for ext in self.extensions.iter_mut() {
            if ext.on_record(now, &mut handle, &record) {
                consumed = true;
                break;
            }
        }

        if consumed {
            return;
        }

        if let Record::Ack { ack_base, mask } = record {
            let acked = expand_ack(crate::seq::SeqNum(ack_base), mask);
            self.resend.on_acked(&acked, now);
            self.sink.emit(Event::AckReceived {
                base: crate::seq::SeqNum(ack_base),
                mask,
            });
        } else {
            self.rx_fifo.push_back(record);
        }
    }

    fn pack_and_send(&mut self, payload: Vec<u8>, reliable: bool, fragment: bool, now: Instant) {
        let seq = self.seq_counter.allocate();
        let rid = if reliable {
            self.rid_counter.allocate()
        } else {
            crate::seq::SeqNum(0)
        };

        let mut flags = PacketFlags::default();
        if reliable {
            flags = flags.with(PacketFlags::RELIABLE);
        }
        if fragment {
            flags = flags.with(PacketFlags::FRAGMENT);
        }
        let header = PacketHeader::new(flags, seq, rid);

        let mut w = packable::Writer::with_capacity(header.packed_len() + payload.len());
        header.pack(&mut w);
        w.write_bytes(&payload);
        let framed = w.into_vec();

        self.sink.emit(Event::PacketPacked {
            rid: if reliable { Some(rid) } else { None },
            size: framed.len(),
        });

        if reliable {
            self.resend.on_send(rid, framed.clone(), now);
        }
        self.endpoint.send(framed, None);
    }

    /// Single-threaded cooperative step. Phases run in this exact order:
    /// I/O drain, RX parse, ACK emission, extension ticks, retransmit
    /// sweep, TX pack.
    pub fn tick(
        &mut self,
        now: Instant,
        rx_budget: Duration,
        tx_budget: Duration,
        max_rx: usize,
        max_tx: usize,
    ) {
        // 1. I/O drain.
        self.endpoint.tick(rx_budget, tx_budget, max_rx, max_tx);

        // 2. RX parse.
        while let Some((bytes, _addr)) = self.endpoint.try_recv() {
            let Some((header, body)) = PacketHeader::decode(&bytes) else {
                self.sink.emit(Event::PacketDropped { reason: "bad packet header" });
                continue;
            };

            if header.flags().has(PacketFlags::RELIABLE) {
                self.ack_mask.note_recv(header.rid());
            }

            let records = if header.flags().has(PacketFlags::FRAGMENT) {
                match self.defragmenter.register_fragment(body, now) {
                    Some(reassembled) => match EnvelopeOpener::open(&reassembled) {
                        Some(records) => records,
                        None => {
                            self.sink.emit(Event::FragmentDropped { reason: "malformed reassembled record" });
                            continue;
                        }
                    },
                    None => continue,
                }
            } else {
                match EnvelopeOpener::open(body) {
                    Some(records) => records,
                    None => {
                        self.sink.emit(Event::PacketDropped { reason: "malformed record stream" });
                        continue;
                    }
                }
            };

            for record in records {
                self.dispatch_incoming(now, record);
            }
        }

        // 3. ACK emission.
        if self.ack_mask.is_dirty() {
            let (base, mask) = self.ack_mask.to_ack_record(8);
            self.sink.emit(Event::AckSent { base, mask });
            self.send_record(Record::Ack { ack_base: base.0, mask }, false);
        }

        // 4. Extension ticks.
        let mut extensions = std::mem::take(&mut self.extensions);
        for ext in extensions.iter_mut() {
            let mut handle = Handle {
                builder: &mut self.builder,
                fragmenter: &mut self.fragmenter,
                pending_fragments: &mut self.pending_fragments,
                mtu: self.mtu,
                local_addr: self.local_addr,
                sink: &self.sink,
            };
            ext.on_tick(now, &mut handle);
        }
        self.extensions = extensions;

        // 5. Retransmit sweep.
        for rid in self.resend.due_timeouts(now) {
            if let Some((payload, retries)) = self.resend.on_retransmit(rid, now) {
                self.sink.emit(Event::Retransmitting { rid, retries });
                self.endpoint.send(payload, None);
            }
        }

        // 6. TX pack: sealed envelopes, then fragmenter output.
        let (envelopes, _index) = self.builder.finish();
        for envelope in envelopes {
            self.pack_and_send(envelope.payload, envelope.reliable, false, now);
        }

        let fragments = std::mem::take(&mut self.pending_fragments);
        for (fragment, reliable) in fragments {
            self.pack_and_send(fragment, reliable, true, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;

    fn config(addr: &str) -> (EndpointConfig, ConnectionConfig, ResendConfig, DefragConfig) {
        // A fixed, almost-certainly-unreachable remote target: these tests
        // inspect sender-side state after `tick`, not actual delivery, and a
        // UDP `send_to` never errors just because nobody is listening.
        let endpoint = EndpointConfig::new(addr.parse().unwrap())
            .connected_to("127.0.0.1:9".parse().unwrap());
        (
            endpoint,
            ConnectionConfig::default(),
            ResendConfig::default(),
            DefragConfig::default(),
        )
    }

    fn new_connection(addr: &str) -> ReliableConnection {
        let (e, c, r, d) = config(addr);
        ReliableConnection::new(e, c, r, d, Arc::new(NullSink)).unwrap()
    }

    #[test]
    fn reliable_delivery_tracks_rid_in_resend_queue() {
        let mut a = new_connection("127.0.0.1:0");
        a.set_next_rid(15);
        a.send_record(Record::Delta(b"test payload".to_vec()), true);
        let now = Instant::now();
        a.tick(now, Duration::from_millis(5), Duration::from_millis(5), 16, 16);
        assert_eq!(a.resend_queue_len(), 1);
    }

    #[test]
    fn envelope_batches_multiple_records_in_one_tick() {
        let mut a = new_connection("127.0.0.1:0");
        a.send_record(Record::Ping { id: 1, ms: 1 }, false);
        a.send_record(Record::Delta(b"first".to_vec()), true);
        a.send_record(Record::Ping { id: 2, ms: 2 }, false);
        a.send_record(Record::Delta(b"second".to_vec()), true);
        let now = Instant::now();
        a.tick(now, Duration::from_millis(5), Duration::from_millis(5), 16, 16);
        // Reliable records were batched into one envelope and assigned one rid.
        assert_eq!(a.resend_queue_len(), 1);
    }
}
