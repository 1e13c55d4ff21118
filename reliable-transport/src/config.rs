//! Implementer-visible configuration knobs, collected into plain structs
//! with sensible defaults for each tunable subsystem.

use std::net::SocketAddr;
use std::time::Duration;

/// How a bounded ring buffer behaves once it is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropPolicy {
    /// Refuse the new enqueue; preserves the order already in the buffer.
    #[default]
    Newest,
    /// Evict the head to make room; preserves freshness.
    Oldest,
}

#[derive(Debug, Clone, Copy)]
pub struct RingBufferConfig {
    pub capacity: usize,
    pub drop_policy: DropPolicy,
}

impl Default for RingBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            drop_policy: DropPolicy::Newest,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub local_addr: SocketAddr,
    pub remote_addr: Option<SocketAddr>,
    pub rx: RingBufferConfig,
    pub tx: RingBufferConfig,
    pub ipv6_only: bool,
    pub reuse_addr: bool,
}

impl EndpointConfig {
    pub fn new(local_addr: SocketAddr) -> Self {
        Self {
            local_addr,
            remote_addr: None,
            rx: RingBufferConfig::default(),
            tx: RingBufferConfig::default(),
            ipv6_only: false,
            reuse_addr: false,
        }
    }

    pub fn connected_to(mut self, remote_addr: SocketAddr) -> Self {
        self.remote_addr = Some(remote_addr);
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    pub mtu: usize,
    pub ack_bits: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            mtu: 1200,
            ack_bits: 64,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResendConfig {
    pub max_retries: u32,
    pub backoff: f64,
    pub min_rto: Duration,
    pub max_rto: Duration,
}

impl Default for ResendConfig {
    fn default() -> Self {
        Self {
            max_retries: 8,
            backoff: 1.5,
            min_rto: Duration::from_millis(100),
            max_rto: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PingConfig {
    pub interval_ms: u32,
    pub max_outstanding: usize,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            max_outstanding: 16,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DefragConfig {
    pub capacity: usize,
    pub ttl: Duration,
}

impl Default for DefragConfig {
    fn default() -> Self {
        Self {
            capacity: 128,
            ttl: Duration::from_secs(5),
        }
    }
}
