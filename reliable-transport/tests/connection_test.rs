//! End-to-end scenarios over a real loopback UDP pair, driving two
//! `ReliableConnection`s through their tick loops directly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reliable_transport::events::NullSink;
use reliable_transport::{ConnectionConfig, DefragConfig, EndpointConfig, ReliableConnection, Record, ResendConfig};

const TICK_BUDGET: Duration = Duration::from_millis(50);

fn connection(local: &str) -> ReliableConnection {
    let endpoint = EndpointConfig::new(local.parse().unwrap());
    ReliableConnection::new(
        endpoint,
        ConnectionConfig::default(),
        ResendConfig::default(),
        DefragConfig::default(),
        Arc::new(NullSink),
    )
    .unwrap()
}

fn pair() -> (ReliableConnection, ReliableConnection) {
    (connection("127.0.0.1:0"), connection("127.0.0.1:0"))
}

/// Ticks both ends until `done` is satisfied or `max_ticks` is exhausted.
fn run_until(a: &mut ReliableConnection, b: &mut ReliableConnection, max_ticks: usize, mut done: impl FnMut(&mut ReliableConnection, &mut ReliableConnection) -> bool) {
    for _ in 0..max_ticks {
        let now = Instant::now();
        a.tick(now, TICK_BUDGET, TICK_BUDGET, 32, 32);
        b.tick(now, TICK_BUDGET, TICK_BUDGET, 32, 32);
        if done(a, b) {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("condition not reached within {max_ticks} ticks");
}

fn rewire(a: &mut ReliableConnection, b: &mut ReliableConnection) {
    let a_addr = a.local_addr();
    let b_addr = b.local_addr();
    // `connected_to` happens at bind time; reconnect each endpoint's socket
    // now that both ports are known, same as a real dial-then-accept.
    a.reconnect_to(b_addr).unwrap();
    b.reconnect_to(a_addr).unwrap();
}

#[test]
fn unreliable_echo_delivers_a_ping() {
    let (mut a, mut b) = pair();
    rewire(&mut a, &mut b);

    a.send_record(Record::Ping { id: 1, ms: 100 }, false);

    let mut delivered = None;
    run_until(&mut a, &mut b, 40, |_a, b| {
        if let Some(record) = b.recv_record() {
            delivered = Some(record);
            true
        } else {
            false
        }
    });

    assert_eq!(delivered, Some(Record::Ping { id: 1, ms: 100 }));
}

#[test]
fn reliable_delivery_acks_and_clears_resend_queue() {
    let (mut a, mut b) = pair();
    rewire(&mut a, &mut b);

    a.set_next_rid(15);
    a.send_record(Record::Delta(b"test payload".to_vec()), true);

    let mut delivered = None;
    run_until(&mut a, &mut b, 40, |a, b| {
        if delivered.is_none() {
            if let Some(record) = b.recv_record() {
                delivered = Some(record);
            }
        }
        delivered.is_some() && a.resend_queue_len() == 0 && b.ack_mask_initialized()
    });

    assert_eq!(delivered, Some(Record::Delta(b"test payload".to_vec())));
    assert!(b.ack_mask_initialized());
    assert_eq!(b.ack_mask_base().0, 15);
    assert_eq!(a.resend_queue_len(), 0);
}

#[test]
fn envelope_batches_multiple_records_in_arrival_order() {
    let (mut a, mut b) = pair();
    rewire(&mut a, &mut b);

    a.send_record(Record::Ping { id: 1, ms: 1 }, false);
    a.send_record(Record::Delta(b"first".to_vec()), true);
    a.send_record(Record::Ping { id: 2, ms: 2 }, false);
    a.send_record(Record::Delta(b"second".to_vec()), true);

    let mut received = Vec::new();
    run_until(&mut a, &mut b, 40, |_a, b| {
        received.extend(b.recv_all());
        received.len() >= 4
    });

    assert_eq!(
        received,
        vec![
            Record::Ping { id: 1, ms: 1 },
            Record::Delta(b"first".to_vec()),
            Record::Ping { id: 2, ms: 2 },
            Record::Delta(b"second".to_vec()),
        ]
    );
}

#[test]
fn oversized_record_is_fragmented_and_reassembled() {
    let endpoint_a = EndpointConfig::new("127.0.0.1:0".parse().unwrap());
    let endpoint_b = EndpointConfig::new("127.0.0.1:0".parse().unwrap());
    let small_mtu = ConnectionConfig {
        mtu: 64,
        ..ConnectionConfig::default()
    };
    let mut a = ReliableConnection::new(
        endpoint_a,
        small_mtu,
        ResendConfig::default(),
        DefragConfig::default(),
        Arc::new(NullSink),
    )
    .unwrap();
    let mut b = ReliableConnection::new(
        endpoint_b,
        small_mtu,
        ResendConfig::default(),
        DefragConfig::default(),
        Arc::new(NullSink),
    )
    .unwrap();
    rewire(&mut a, &mut b);

    let blob = vec![b'a'; 400];
    a.send_record(Record::Delta(blob.clone()), true);

    let mut delivered = None;
    run_until(&mut a, &mut b, 60, |_a, b| {
        if let Some(record) = b.recv_record() {
            delivered = Some(record);
            true
        } else {
            false
        }
    });

    assert_eq!(delivered, Some(Record::Delta(blob)));
}
