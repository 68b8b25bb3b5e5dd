//! End-to-end poll scenarios.
//!
//! Each test drives cumulative state by hand and checks the exact lines a
//! registry-built function timer emits.

use super::common::{buffered_registry, etsy_config, timing_value, total_value, ManualInstrument};
use statsd_common::{MeterId, StatsdConfig, StatsdFlavor, TimeUnit};
use std::sync::Arc;

#[test]
fn test_poll_sequence_emits_one_line_per_new_event() {
    let (registry, buffer) = buffered_registry(etsy_config());
    let instrument = Arc::new(ManualInstrument::new());
    let timer = registry
        .function_timer(MeterId::new("jobs"), Arc::clone(&instrument))
        .unwrap();

    // Nothing recorded yet.
    timer.poll().unwrap();
    assert!(buffer.is_empty());

    instrument.set(3, 30.0);
    timer.poll().unwrap();
    assert_eq!(buffer.drain(), vec!["jobs:10|ms"; 3]);

    // Unchanged state emits nothing and keeps the time register.
    timer.poll().unwrap();
    assert!(buffer.is_empty());
    assert_eq!(timer.last_count(), 3);
    assert_eq!(timer.last_time(), 30.0);

    instrument.set(5, 45.0);
    timer.poll().unwrap();
    assert_eq!(buffer.drain(), vec!["jobs:7.5|ms"; 2]);
    assert_eq!(timer.last_count(), 5);
    assert_eq!(timer.last_time(), 45.0);
}

#[test]
fn test_average_of_emitted_lines_matches_delta_mean() {
    let (registry, buffer) = buffered_registry(etsy_config());
    let instrument = Arc::new(ManualInstrument::new());
    let timer = registry
        .function_timer(MeterId::new("batch"), Arc::clone(&instrument))
        .unwrap();

    instrument.set(3, 1.0);
    timer.poll().unwrap();

    let lines = buffer.drain();
    assert_eq!(lines.len(), 3);
    for line in &lines {
        assert_eq!(line, "batch:0.333333|ms");
    }
    assert!((total_value(&lines) - 1.0).abs() < 1e-5);
}

#[test]
fn test_totals_are_conserved_across_polls() {
    let (registry, buffer) = buffered_registry(etsy_config());
    let instrument = Arc::new(ManualInstrument::new());
    let timer = registry
        .function_timer(MeterId::new("rpc"), Arc::clone(&instrument))
        .unwrap();

    let steps = [(2, 8.0), (2, 8.0), (7, 20.5), (11, 31.25), (12, 40.0), (20, 40.0)];
    for (count, total) in steps {
        instrument.set(count, total);
        timer.poll().unwrap();
    }

    let lines = buffer.lines();
    assert_eq!(lines.len(), 20);
    assert!((total_value(&lines) - 40.0).abs() < 1e-4);
}

#[test]
fn test_count_regression_is_ignored_until_caught_up() {
    let (registry, buffer) = buffered_registry(etsy_config());
    let instrument = Arc::new(ManualInstrument::new());
    let timer = registry
        .function_timer(MeterId::new("queue"), Arc::clone(&instrument))
        .unwrap();

    instrument.set(4, 40.0);
    timer.poll().unwrap();
    buffer.drain();

    instrument.set(2, 20.0);
    timer.poll().unwrap();
    assert!(buffer.is_empty());
    assert_eq!(timer.last_count(), 4);
    assert_eq!(timer.last_time(), 40.0);

    instrument.set(6, 60.0);
    timer.poll().unwrap();
    assert_eq!(buffer.drain(), vec!["queue:10|ms"; 2]);
}

#[test]
fn test_time_regression_emits_zero_valued_lines() {
    let (registry, buffer) = buffered_registry(etsy_config());
    let instrument = Arc::new(ManualInstrument::new());
    let timer = registry
        .function_timer(MeterId::new("io"), Arc::clone(&instrument))
        .unwrap();

    instrument.set(2, 10.0);
    timer.poll().unwrap();
    buffer.drain();

    instrument.set(3, 9.0);
    timer.poll().unwrap();
    assert_eq!(buffer.drain(), vec!["io:0|ms"]);
    assert_eq!(timer.last_time(), 10.0);
}

#[test]
fn test_flavored_lines_through_registry() {
    let config = StatsdConfig {
        flavor: StatsdFlavor::Datadog,
        prefix: Some("shop".into()),
        ..StatsdConfig::default()
    };
    let (registry, buffer) = buffered_registry(config);
    let instrument = Arc::new(ManualInstrument::new());
    let timer = registry
        .function_timer(
            MeterId::new("http.requests").with_tag("uri", "/cart"),
            Arc::clone(&instrument),
        )
        .unwrap();

    instrument.set(1, 12.5);
    timer.poll().unwrap();

    assert_eq!(buffer.lines(), vec!["shop.http.requests:12.5|ms|#uri:/cart"]);
}

#[test]
fn test_values_are_published_in_milliseconds() {
    let (registry, buffer) = buffered_registry(etsy_config());
    let instrument = Arc::new(ManualInstrument::new());
    let timer = registry
        .function_timer(MeterId::new("export"), Arc::clone(&instrument))
        .unwrap();

    instrument.set(2, 3000.0);
    timer.poll().unwrap();

    let lines = buffer.lines();
    assert_eq!(lines, vec!["export:1500|ms"; 2]);
    assert_eq!(timing_value(&lines[0]), 1500.0);
    assert_eq!(timer.base_time_unit(), TimeUnit::Milliseconds);
    assert_eq!(timer.last_time(), 3000.0);
}
