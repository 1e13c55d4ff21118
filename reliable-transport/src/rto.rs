//! RFC 6298-style RTO estimation, RFC 3550 §6.4.1 jitter, and a Welford
//! running variance for diagnostics.

use std::time::Duration;

use crate::config::ResendConfig;

const ALPHA: f64 = 1.0 / 8.0;
const BETA: f64 = 1.0 / 4.0;
/// Assumed OS timer granularity; the `G` term of RFC 6298's RTO formula.
const CLOCK_GRANULARITY: Duration = Duration::from_millis(1);

fn to_secs(d: Duration) -> f64 {
    d.as_secs_f64()
}

fn from_secs(s: f64) -> Duration {
    Duration::from_secs_f64(s.max(0.0))
}

/// Running RTO estimate plus jitter and variance accumulators for one
/// connection's reliable traffic.
#[derive(Debug, Clone, Copy)]
pub struct RttEstimator {
    srtt: f64,
    rttvar: f64,
    rto: Duration,
    initialized: bool,
    jitter: f64,
    last_sample: Option<f64>,
    welford_mean: f64,
    welford_m2: f64,
    welford_count: u64,
    min_rto: Duration,
    max_rto: Duration,
}

impl RttEstimator {
    pub fn new(config: ResendConfig) -> Self {
        Self {
            srtt: 0.0,
            rttvar: 0.0,
            rto: config.min_rto,
            initialized: false,
            jitter: 0.0,
            last_sample: None,
            welford_mean: 0.0,
            welford_m2: 0.0,
            welford_count: 0,
            min_rto: config.min_rto,
            max_rto: config.max_rto,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn rto(&self) -> Duration {
        self.rto
    }

    pub fn jitter(&self) -> Duration {
        from_secs(self.jitter)
    }

    /// Sample standard deviation of all RTT samples fed so far, or `0` if
    /// fewer than two samples have been taken.
    pub fn stddev(&self) -> Duration {
        if self.welford_count < 2 {
            return Duration::ZERO;
        }
        from_secs((self.welford_m2 / (self.welford_count as f64 - 1.0)).sqrt())
    }

    /// Feeds one RTT sample (Karn's rule: callers must only call this for
    /// ACKs of packets that were never retransmitted).
    pub fn sample(&mut self, r: Duration) {
        let r = to_secs(r);

        if !self.initialized {
            self.srtt = r;
            self.rttvar = r / 2.0;
            self.initialized = true;
        } else {
            self.rttvar = (1.0 - BETA) * self.rttvar + BETA * (self.srtt - r).abs();
            self.srtt = (1.0 - ALPHA) * self.srtt + ALPHA * r;
        }
        self.rto = from_secs(self.srtt + to_secs(CLOCK_GRANULARITY).max(4.0 * self.rttvar))
            .clamp(self.min_rto, self.max_rto);

        if let Some(last) = self.last_sample {
            self.jitter += ((r - last).abs() - self.jitter) / 16.0;
        }
        self.last_sample = Some(r);

        self.welford_count += 1;
        let delta = r - self.welford_mean;
        self.welford_mean += delta / self.welford_count as f64;
        let delta2 = r - self.welford_mean;
        self.welford_m2 += delta * delta2;
    }

    /// The effective RTO for a packet that has already been retransmitted
    /// `retries` times: `rto * backoff^retries`, clamped.
    pub fn effective_rto(&self, retries: u32, backoff: f64) -> Duration {
        let scaled = to_secs(self.rto) * backoff.powi(retries as i32);
        from_secs(scaled).clamp(self.min_rto, self.max_rto)
    }
}
