//! Periodic ping/pong liveness and RTT sampling.
//!
//! Timestamps here are wire-format `ms: u32` ticks, not `Instant`s — the
//! same wrap-safe-u32 comparison the sequence space uses, since `Ping.ms`
//! travels on the wire as a `u32`.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::PingConfig;
use crate::rto::RttEstimator;

fn wrapping_ge(a: u32, b: u32) -> bool {
    a == b || a.wrapping_sub(b) < 0x8000_0000
}

#[derive(Debug, Clone, Copy)]
struct Outstanding {
    sent_ms: u32,
}

#[derive(Debug)]
pub struct PingManager {
    config: PingConfig,
    next_due_ms: u32,
    next_id: u16,
    outstanding: HashMap<u16, Outstanding>,
}

impl PingManager {
    pub fn new(config: PingConfig) -> Self {
        Self {
            config,
            next_due_ms: 0,
            next_id: 0,
            outstanding: HashMap::new(),
        }
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    pub fn is_due(&self, now_ms: u32) -> bool {
        wrapping_ge(now_ms, self.next_due_ms) && self.outstanding.len() < self.config.max_outstanding
    }

    /// Allocates the next ping id, records it as outstanding, and advances
    /// the due time. Returns `(id, ms)` to embed in a `Ping` record.
    pub fn make_ping(&mut self, now_ms: u32) -> (u16, u32) {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.outstanding.insert(id, Outstanding { sent_ms: now_ms });
        self.next_due_ms = self.next_due_ms.wrapping_add(self.config.interval_ms);
        (id, now_ms)
    }

    /// A received `Ping{id, ms}` is always echoed back verbatim as a `Pong`.
    pub fn on_recv_ping(&self, id: u16, ms: u32) -> (u16, u32) {
        (id, ms)
    }

    /// A received `Pong{id, ms}` resolves the matching outstanding ping and
    /// samples its RTT into the estimator, if it is still outstanding.
    pub fn on_recv_pong(&mut self, id: u16, now_ms: u32, estimator: &mut RttEstimator) {
        if let Some(entry) = self.outstanding.remove(&id) {
            let rtt_ms = now_ms.wrapping_sub(entry.sent_ms);
            estimator.sample(Duration::from_millis(rtt_ms as u64));
        }
    }

    /// Ids of outstanding pings older than `interval_ms` — presumed lost.
    pub fn prune(&mut self, now_ms: u32) -> Vec<u16> {
        let interval = self.config.interval_ms;
        let lost: Vec<u16> = self
            .outstanding
            .iter()
            .filter(|(_, entry)| now_ms.wrapping_sub(entry.sent_ms) > interval)
            .map(|(id, _)| *id)
            .collect();
        for id in &lost {
            self.outstanding.remove(id);
        }
        lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResendConfig;

    fn ping_config() -> PingConfig {
        PingConfig {
            interval_ms: 1000,
            max_outstanding: 2,
        }
    }

    #[test]
    fn due_only_after_interval_elapses() {
        let pm = PingManager::new(ping_config());
        assert!(pm.is_due(0));
    }

    #[test]
    fn max_outstanding_blocks_further_pings() {
        let mut pm = PingManager::new(ping_config());
        pm.make_ping(0);
        pm.make_ping(10);
        assert_eq!(pm.outstanding_count(), 2);
        assert!(!pm.is_due(10));
    }

    #[test]
    fn pong_resolves_outstanding_and_samples_rtt() {
        let mut pm = PingManager::new(ping_config());
        let mut estimator = RttEstimator::new(ResendConfig::default());
        let (id, ms) = pm.make_ping(1000);
        pm.on_recv_pong(id, 1000 + 42, &mut estimator);
        assert_eq!(pm.outstanding_count(), 0);
        assert!(estimator.is_initialized());
        assert_eq!(ms, 1000);
    }

    #[test]
    fn recv_ping_echoes_fields_verbatim() {
        let pm = PingManager::new(ping_config());
        assert_eq!(pm.on_recv_ping(7, 12345), (7, 12345));
    }

    #[test]
    fn prune_evicts_only_stale_outstanding_pings() {
        let mut pm = PingManager::new(ping_config());
        pm.make_ping(0);
        let lost = pm.prune(500);
        assert!(lost.is_empty());
        let lost = pm.prune(1500);
        assert_eq!(lost, vec![0]);
        assert_eq!(pm.outstanding_count(), 0);
    }
}
