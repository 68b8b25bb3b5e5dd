//! Conservation under concurrent polls and producers.
//!
//! However polls interleave with each other and with producers, every
//! recorded operation must end up in exactly one line and the values of all
//! lines must add up to the recorded total.

use super::common::{buffered_registry, etsy_config, total_value};
use crossbeam_utils::thread;
use statsd_common::{CumulativeInstrument, CumulativeTimer, MeterId, TimeUnit};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const PRODUCERS: u64 = 4;
const RECORDS_PER_PRODUCER: u64 = 2_000;
const POLLERS: usize = 3;

#[test]
fn test_concurrent_polls_conserve_count_and_time() {
    let (registry, buffer) = buffered_registry(etsy_config());
    let instrument = Arc::new(CumulativeTimer::new());
    let timer = registry
        .function_timer(MeterId::new("work"), Arc::clone(&instrument))
        .unwrap();
    let producing = AtomicBool::new(true);

    thread::scope(|s| {
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let instrument = &instrument;
                s.spawn(move |_| {
                    for i in 0..RECORDS_PER_PRODUCER {
                        // 1ms..=4ms, so totals stay exact in f64.
                        instrument.record(Duration::from_millis(1 + (p + i) % 4));
                    }
                })
            })
            .collect();

        for _ in 0..POLLERS {
            let timer = &timer;
            let producing = &producing;
            s.spawn(move |_| {
                while producing.load(Ordering::Acquire) {
                    timer.poll().unwrap();
                }
            });
        }

        for producer in producers {
            producer.join().unwrap();
        }
        producing.store(false, Ordering::Release);
    })
    .unwrap();

    // Catch whatever the last concurrent poll left behind.
    timer.poll().unwrap();

    let expected_count = PRODUCERS * RECORDS_PER_PRODUCER;
    let expected_time = instrument.total_time(TimeUnit::Milliseconds);
    let lines = buffer.lines();

    assert_eq!(instrument.count(), expected_count);
    assert_eq!(lines.len() as u64, expected_count);
    assert_eq!(timer.last_count(), expected_count);
    assert_eq!(timer.last_time(), expected_time);
    // Each line is rounded to six decimals.
    assert!((total_value(&lines) - expected_time).abs() < 1e-6 * expected_count as f64);
}

#[test]
fn test_racing_polls_on_stationary_state_emit_once() {
    let (registry, buffer) = buffered_registry(etsy_config());
    let instrument = Arc::new(CumulativeTimer::new());
    let timer = registry
        .function_timer(MeterId::new("burst"), Arc::clone(&instrument))
        .unwrap();

    for _ in 0..50 {
        instrument.record(Duration::from_millis(4));
    }

    thread::scope(|s| {
        for _ in 0..8 {
            let timer = &timer;
            s.spawn(move |_| {
                for _ in 0..10 {
                    timer.poll().unwrap();
                }
            });
        }
    })
    .unwrap();

    let lines = buffer.lines();
    assert_eq!(lines.len(), 50);
    assert!(lines.iter().all(|line| line == "burst:4|ms"));
}
