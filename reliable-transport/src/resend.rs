//! Retains reliable packet payloads until acked or abandoned, and drives
//! RTO estimation from first-attempt ACKs only.

use std::collections::HashMap;
use std::time::Instant;

use crate::config::ResendConfig;
use crate::rto::RttEstimator;
use crate::seq::SeqNum;

#[derive(Debug, Clone)]
struct PendingEntry {
    payload: Vec<u8>,
    sent_at: Instant,
    retries: u32,
}

#[derive(Debug)]
pub struct ResendQueue {
    pending: HashMap<u16, PendingEntry>,
    config: ResendConfig,
    estimator: RttEstimator,
}

impl ResendQueue {
    pub fn new(config: ResendConfig) -> Self {
        Self {
            pending: HashMap::new(),
            estimator: RttEstimator::new(config),
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn rto(&self) -> std::time::Duration {
        self.estimator.rto()
    }

    pub fn on_send(&mut self, rid: SeqNum, payload: Vec<u8>, now: Instant) {
        self.pending.insert(
            rid.0,
            PendingEntry {
                payload,
                sent_at: now,
                retries: 0,
            },
        );
    }

    /// Removes acked entries; feeds an RTT sample only for entries that were
    /// never retransmitted (Karn's rule).
    pub fn on_acked(&mut self, rids: &[SeqNum], now: Instant) {
        for rid in rids {
            if let Some(entry) = self.pending.remove(&rid.0) {
                if entry.retries == 0 {
                    self.estimator.sample(now.duration_since(entry.sent_at));
                }
            }
        }
    }

    /// Ids of entries whose age has reached their effective RTO.
    pub fn due_timeouts(&self, now: Instant) -> Vec<SeqNum> {
        self.pending
            .iter()
            .filter_map(|(rid, entry)| {
                let effective = self.estimator.effective_rto(entry.retries, self.config.backoff);
                if now.duration_since(entry.sent_at) >= effective {
                    Some(SeqNum(*rid))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Advances an entry's retry count and returns its payload and new retry
    /// count for re-sending, or drops it permanently once `max_retries` is
    /// exceeded.
    pub fn on_retransmit(&mut self, rid: SeqNum, now: Instant) -> Option<(Vec<u8>, u32)> {
        let entry = self.pending.get_mut(&rid.0)?;
        if entry.retries >= self.config.max_retries {
            self.pending.remove(&rid.0);
            return None;
        }
        entry.retries += 1;
        entry.sent_at = now;
        Some((entry.payload.clone(), entry.retries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> ResendConfig {
        ResendConfig {
            max_retries: 3,
            backoff: 1.5,
            min_rto: Duration::from_millis(100),
            max_rto: Duration::from_secs(2),
        }
    }

    #[test]
    fn acked_entry_is_removed_and_samples_rtt() {
        let mut q = ResendQueue::new(config());
        let t0 = Instant::now();
        q.on_send(SeqNum(1), b"payload".to_vec(), t0);
        q.on_acked(&[SeqNum(1)], t0 + Duration::from_millis(50));
        assert!(q.is_empty());
        assert!(q.rto() >= config().min_rto);
    }

    #[test]
    fn karns_rule_skips_sample_after_retransmit() {
        let mut q = ResendQueue::new(config());
        let t0 = Instant::now();
        q.on_send(SeqNum(1), b"payload".to_vec(), t0);
        q.on_retransmit(SeqNum(1), t0 + Duration::from_millis(200));
        q.on_acked(&[SeqNum(1)], t0 + Duration::from_millis(250));
        // Never sampled: estimator stays at its default, uninitialized state.
        assert_eq!(q.rto(), config().min_rto);
    }

    #[test]
    fn unknown_rid_ack_is_noop() {
        let mut q = ResendQueue::new(config());
        q.on_acked(&[SeqNum(99)], Instant::now());
        assert!(q.is_empty());
    }

    #[test]
    fn retransmit_escalation_abandons_after_max_retries() {
        let mut q = ResendQueue::new(config());
        let mut now = Instant::now();
        q.on_send(SeqNum(1), b"payload".to_vec(), now);
        q.estimator.sample(Duration::from_millis(100));

        let mut intervals = vec![];
        let mut last_retransmit_at = now;
        for _ in 0..4 {
            now += Duration::from_secs(5); // well past any effective RTO
            let due = q.due_timeouts(now);
            if due.is_empty() {
                break;
            }
            assert_eq!(due, vec![SeqNum(1)]);
            let before = q.pending.get(&1).map(|e| e.retries);
            let result = q.on_retransmit(SeqNum(1), now);
            if let Some((_payload, retries)) = &result {
                intervals.push(now.duration_since(last_retransmit_at));
                last_retransmit_at = now;
                assert!(before.unwrap() < config().max_retries);
                assert_eq!(*retries, before.unwrap() + 1);
            } else {
                assert!(before.unwrap() >= config().max_retries);
            }
        }
        assert!(q.is_empty(), "entry should be abandoned after max_retries");
        for interval in &intervals {
            assert!(*interval >= config().min_rto);
        }
    }
}
