//! StatsD bridge daemon entry point.
//!
//! Feeds simulated cumulative timers, polls them on a fixed cadence and
//! writes the approximated StatsD timing lines to stdout. Logs go to stderr.

mod report;
mod signals;
mod simulation;

use anyhow::{Context, Result};
use clap::Parser;
use statsd_common::{BridgeConfig, CumulativeTimer, MeterId, StatsdFlavor};
use statsd_runtime::{PollScheduler, SharedSink, StatsdRegistry, WriterSink};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::report::{format_report, Reporter};
use crate::signals::{wait_for_shutdown, SignalHandler};
use crate::simulation::LoadSimulator;

/// Bridge daemon command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "statsd-daemon",
    about = "StatsD bridge daemon - turns cumulative timers into StatsD timing lines",
    version,
    long_about = None
)]
struct Args {
    /// Path to a bridge configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// StatsD flavor (overrides config file).
    #[arg(long, short = 'f')]
    flavor: Option<StatsdFlavor>,

    /// Polling interval, e.g. "500ms" (overrides config file).
    #[arg(long, value_parser = humantime::parse_duration)]
    poll_interval: Option<Duration>,

    /// Maximum poll cycles to run (0 = infinite).
    #[arg(long, default_value = "0")]
    max_polls: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting StatsD bridge daemon");

    let mut config = load_config(&args)?;

    if let Some(flavor) = args.flavor {
        config.statsd.flavor = flavor;
    }
    if let Some(interval) = args.poll_interval {
        config.polling.frequency = interval;
    }
    config.validate().context("Invalid configuration")?;

    info!(
        flavor = %config.statsd.flavor,
        frequency = ?config.polling.frequency,
        timers = config.simulation.timers.len(),
        "Configuration loaded"
    );

    let signal_handler = SignalHandler::new().context("Failed to set up signal handlers")?;

    run_daemon(&config, &signal_handler, args.max_polls)
}

/// Initialize logging to stderr with the specified log level.
fn init_logging(level: &str) {
    let filter = format!("statsd_daemon={level},statsd_runtime={level},statsd_common={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `STATSD_BRIDGE_CONFIG` environment variable
/// 3. `/etc/statsd-bridge/config.toml` (system path)
/// 4. `config/default.toml` (local development)
/// 5. Built-in defaults
fn load_config(args: &Args) -> Result<BridgeConfig> {
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return BridgeConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"));
    }

    if let Ok(env_path) = std::env::var("STATSD_BRIDGE_CONFIG") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from STATSD_BRIDGE_CONFIG");
            return BridgeConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from STATSD_BRIDGE_CONFIG={env_path:?}")
            });
        }
        warn!(
            path = %env_path,
            "STATSD_BRIDGE_CONFIG set but file does not exist, checking other locations"
        );
    }

    for candidate in ["/etc/statsd-bridge/config.toml", "config/default.toml"] {
        let config_path = PathBuf::from(candidate);
        if config_path.exists() {
            info!(?config_path, "Loading config from file");
            return BridgeConfig::from_file(&config_path)
                .with_context(|| format!("Failed to load config from {config_path:?}"));
        }
    }

    info!("No config file found, using built-in defaults");
    Ok(BridgeConfig::default())
}

/// Main daemon run loop.
fn run_daemon(config: &BridgeConfig, signal_handler: &SignalHandler, max_polls: u64) -> Result<()> {
    let sink = Arc::new(WriterSink::new(std::io::stdout()));
    let registry = Arc::new(StatsdRegistry::new(
        config.statsd.clone(),
        Arc::clone(&sink) as SharedSink,
    ));

    let mut instruments = Vec::with_capacity(config.simulation.timers.len());
    let mut function_timers = Vec::with_capacity(config.simulation.timers.len());
    for timer_config in &config.simulation.timers {
        let id = MeterId::new(timer_config.name.clone()).with_tags(timer_config.tags.clone());
        let instrument = Arc::new(CumulativeTimer::new());
        let function_timer = registry
            .function_timer(id, Arc::clone(&instrument))
            .with_context(|| format!("Failed to register timer {:?}", timer_config.name))?;
        instruments.push(instrument);
        function_timers.push(function_timer);
    }
    info!(meters = registry.len(), "Meters registered");

    let reporter = Reporter::new(function_timers);
    let mut simulator = LoadSimulator::new(instruments, &config.simulation);
    let mut scheduler = PollScheduler::new(Arc::clone(&registry), &config.polling);

    simulator.start().context("Failed to start load simulator")?;
    scheduler.start().context("Failed to start poll scheduler")?;

    while !wait_for_shutdown(signal_handler, Duration::from_millis(100)) {
        if signal_handler.take_report_request() {
            info!(report = %format_report(&reporter.snapshot(&scheduler)), "Bridge report");
        }

        if max_polls > 0 && scheduler.poll_count() >= max_polls {
            info!(polls = scheduler.poll_count(), "Maximum poll count reached");
            signal_handler.request_shutdown();
        }
    }

    info!("Shutting down...");

    // Stop producers first so the final poll sees settled totals.
    simulator.stop();
    scheduler.stop();

    if let Err(e) = sink.flush() {
        error!(error = %e, "Failed to flush stdout");
    }

    let report = reporter.snapshot(&scheduler);
    let pending: u64 = report.meters.iter().map(report::MeterReport::pending).sum();
    info!(
        polls = report.polls,
        poll_errors = report.poll_errors,
        pending,
        signals = signal_handler.state().signal_count(),
        uptime_secs = reporter.uptime().as_secs(),
        report = %format_report(&report),
        "Daemon shutdown complete"
    );

    Ok(())
}
