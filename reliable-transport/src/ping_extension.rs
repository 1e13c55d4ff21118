//! Ping/pong wired in as an extension rather than an inline connection path,
//! so liveness sampling can be swapped out or disabled independently.

use std::sync::Arc;
use std::time::Instant;

use crate::catalog::Record;
use crate::config::{PingConfig, ResendConfig};
use crate::events::{Event, Sink};
use crate::extension::{ConnectionHandle, Extension};
use crate::ping::PingManager;
use crate::rto::RttEstimator;

pub struct PingExtension {
    manager: PingManager,
    estimator: RttEstimator,
    epoch: Option<Instant>,
    sink: Arc<dyn Sink>,
}

impl PingExtension {
    pub fn new(config: PingConfig, estimator_config: ResendConfig, sink: Arc<dyn Sink>) -> Self {
        Self {
            manager: PingManager::new(config),
            estimator: RttEstimator::new(estimator_config),
            epoch: None,
            sink,
        }
    }

    pub fn rtt_estimator(&self) -> &RttEstimator {
        &self.estimator
    }

    fn now_ms(&mut self, now: Instant) -> u32 {
        let epoch = *self.epoch.get_or_insert(now);
        now.duration_since(epoch).as_millis() as u32
    }
}

impl Extension for PingExtension {
    fn on_tick(&mut self, now: Instant, conn: &mut dyn ConnectionHandle) {
        let now_ms = self.now_ms(now);

        for id in self.manager.prune(now_ms) {
            self.sink.emit(Event::PingLost { id });
        }

        if self.manager.is_due(now_ms) {
            let (id, ms) = self.manager.make_ping(now_ms);
            self.sink.emit(Event::PingSent { id });
            conn.send_record(Record::Ping { id, ms }, false);
        }
    }

    fn on_record(&mut self, now: Instant, conn: &mut dyn ConnectionHandle, record: &Record) -> bool {
        let now_ms = self.now_ms(now);
        match *record {
            Record::Ping { id, ms } => {
                let (id, ms) = self.manager.on_recv_ping(id, ms);
                conn.send_record(Record::Pong { id, ms }, false);
                true
            }
            Record::Pong { id, .. } => {
                self.manager.on_recv_pong(id, now_ms, &mut self.estimator);
                true
            }
            _ => false,
        }
    }
}
