//! Non-blocking UDP socket with bounded, drop-policy RX/TX ring buffers.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};

use socket2::{Domain, Socket, Type};

use crate::config::EndpointConfig;
use crate::events::{Event, Sink};
use crate::ring_buffer::{EnqueueOutcome, RingBuffer};

const RECV_BUF_SIZE: usize = 2048;

/// Counts of datagrams actually moved during one [`UdpEndpoint::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainCounts {
    pub received: usize,
    pub sent: usize,
}

pub struct UdpEndpoint {
    socket: UdpSocket,
    remote_addr: Option<SocketAddr>,
    rx: RingBuffer<(Vec<u8>, SocketAddr)>,
    tx: RingBuffer<(Vec<u8>, SocketAddr)>,
    sink: Arc<dyn Sink>,
}

impl UdpEndpoint {
    pub fn bind(config: EndpointConfig, sink: Arc<dyn Sink>) -> std::io::Result<Self> {
        let domain = match config.local_addr {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        };
        let raw = Socket::new(domain, Type::DGRAM, None)?;
        if domain == Domain::IPV6 {
            raw.set_only_v6(config.ipv6_only)?;
        }
        raw.set_reuse_address(config.reuse_addr)?;
        raw.bind(&config.local_addr.into())?;
        let socket: UdpSocket = raw.into();
        socket.set_nonblocking(true)?;
        if let Some(remote) = config.remote_addr {
            socket.connect(remote)?;
        }
        Ok(Self {
            socket,
            remote_addr: config.remote_addr,
            rx: RingBuffer::new(config.rx),
            tx: RingBuffer::new(config.tx),
            sink,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Redirects the default send/recv peer, e.g. once a rendezvous step
    /// has revealed the remote's actual address post-bind.
    pub fn connect(&mut self, addr: SocketAddr) -> std::io::Result<()> {
        self.socket.connect(addr)?;
        self.remote_addr = Some(addr);
        Ok(())
    }

    /// Queues `payload` for the next `tick`'s TX drain. `addr` overrides the
    /// connected remote address for this datagram, if any.
    pub fn send(&mut self, payload: Vec<u8>, addr: Option<SocketAddr>) {
        let target = addr.or(self.remote_addr).unwrap_or_else(|| {
            self.socket
                .peer_addr()
                .expect("send() requires a connected socket or an explicit address")
        });
        match self.tx.push((payload, target)) {
            EnqueueOutcome::Pushed => {}
            EnqueueOutcome::DroppedNewest => {
                self.sink.emit(Event::RingEnqueueDropped { policy: "newest" });
            }
            EnqueueOutcome::DroppedOldest => {
                self.sink.emit(Event::RingEnqueueDropped { policy: "oldest" });
            }
        }
    }

    /// Pops the next received `(payload, addr)`, if any.
    pub fn try_recv(&mut self) -> Option<(Vec<u8>, SocketAddr)> {
        let item = self.rx.pop();
        if item.is_some() {
            self.sink.emit(Event::RingDequeued);
        }
        item
    }

    /// Drains both directions under a dual bound: stop when either the
    /// message count or the wall-clock budget is reached. `EAGAIN`
    /// (`WouldBlock`) means "nothing more" on either side.
    pub fn tick(
        &mut self,
        rx_budget: Duration,
        tx_budget: Duration,
        max_rx: usize,
        max_tx: usize,
    ) -> DrainCounts {
        let mut counts = DrainCounts::default();
        let rx_start = Instant::now();
        let mut buf = [0u8; RECV_BUF_SIZE];
        while counts.received < max_rx && rx_start.elapsed() < rx_budget {
            match self.socket.recv_from(&mut buf) {
                Ok((len, addr)) => {
                    match self.rx.push((buf[..len].to_vec(), addr)) {
                        EnqueueOutcome::Pushed => {}
                        EnqueueOutcome::DroppedNewest => {
                            self.sink.emit(Event::RingEnqueueDropped { policy: "newest" });
                        }
                        EnqueueOutcome::DroppedOldest => {
                            self.sink.emit(Event::RingEnqueueDropped { policy: "oldest" });
                        }
                    }
                    counts.received += 1;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
        }
        self.sink.emit(Event::DrainTimeMicros {
            direction: "rx",
            micros: rx_start.elapsed().as_micros(),
        });

        let tx_start = Instant::now();
        while counts.sent < max_tx && tx_start.elapsed() < tx_budget {
            let Some((payload, addr)) = self.tx.pop() else {
                break;
            };
            match self.socket.send_to(&payload, addr) {
                Ok(_) => counts.sent += 1,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    // Retained for the next drain: put it back at the front.
                    self.tx.push_front((payload, addr));
                    break;
                }
                Err(_) => break,
            }
        }
        self.sink.emit(Event::DrainTimeMicros {
            direction: "tx",
            micros: tx_start.elapsed().as_micros(),
        });

        counts
    }
}
