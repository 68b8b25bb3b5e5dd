//! Scheduler lifecycle and configuration-file tests.

use super::common::{buffered_registry, etsy_config, ManualInstrument};
use statsd_common::{BridgeConfig, MeterId, PollingConfig, StatsdFlavor};
use statsd_runtime::PollScheduler;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_scheduler_polls_on_cadence() {
    let (registry, buffer) = buffered_registry(etsy_config());
    let registry = Arc::new(registry);
    let instrument = Arc::new(ManualInstrument::new());
    registry
        .function_timer(MeterId::new("cadence"), Arc::clone(&instrument))
        .unwrap();
    instrument.set(2, 5.0);

    let config = PollingConfig {
        frequency: Duration::from_millis(20),
        final_poll_on_stop: false,
    };
    let mut scheduler = PollScheduler::new(Arc::clone(&registry), &config);
    scheduler.start().unwrap();
    assert!(scheduler.is_running());

    let deadline = Instant::now() + Duration::from_secs(2);
    while buffer.len() < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    scheduler.stop();

    assert!(!scheduler.is_running());
    assert!(scheduler.poll_count() >= 1);
    assert_eq!(scheduler.error_count(), 0);
    assert_eq!(buffer.lines(), vec!["cadence:2.5|ms"; 2]);
}

#[test]
fn test_final_poll_flushes_pending_delta() {
    let (registry, buffer) = buffered_registry(etsy_config());
    let registry = Arc::new(registry);
    let instrument = Arc::new(ManualInstrument::new());
    registry
        .function_timer(MeterId::new("tail"), Arc::clone(&instrument))
        .unwrap();

    let config = PollingConfig {
        frequency: Duration::from_secs(60),
        final_poll_on_stop: true,
    };
    let mut scheduler = PollScheduler::new(Arc::clone(&registry), &config);
    scheduler.start().unwrap();

    instrument.set(3, 9.0);
    let started = Instant::now();
    scheduler.stop();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(buffer.lines(), vec!["tail:3|ms"; 3]);
    assert_eq!(scheduler.poll_count(), 1);
}

#[test]
fn test_config_file_drives_registry() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[statsd]
flavor = "telegraf"
prefix = "svc"

[polling]
frequency = "250ms"
"#
    )
    .unwrap();

    let config = BridgeConfig::from_file(file.path()).unwrap();
    assert_eq!(config.statsd.flavor, StatsdFlavor::Telegraf);
    assert_eq!(config.polling.frequency, Duration::from_millis(250));
    assert!(config.polling.final_poll_on_stop);

    let (registry, buffer) = buffered_registry(config.statsd);
    let instrument = Arc::new(ManualInstrument::new());
    let timer = registry
        .function_timer(
            MeterId::new("db.query").with_tag("table", "users"),
            Arc::clone(&instrument),
        )
        .unwrap();

    instrument.set(1, 1500.0);
    timer.poll().unwrap();

    assert_eq!(buffer.lines(), vec!["svc_db_query,table=users:1500|ms"]);
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[polling]\nfrequency = \"0s\"\n").unwrap();

    assert!(BridgeConfig::from_file(file.path()).is_err());
}
