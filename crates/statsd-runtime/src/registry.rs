//! Registry of polled meters sharing one sink and one line dialect.

use crate::function_timer::FunctionTimer;
use crate::line::{LineEncoder, StatsdLineBuilder};
use crate::sink::{LineSink, SharedSink};
use statsd_common::{
    BridgeError, BridgeResult, CumulativeInstrument, MeterId, StatsdConfig, TimeUnit,
};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Something the scheduler polls on every tick.
pub trait Pollable: Send + Sync {
    /// Identity of the polled meter.
    fn id(&self) -> &MeterId;

    /// Run one poll cycle.
    fn poll(&self) -> BridgeResult<()>;
}

/// Function timer as built by [`StatsdRegistry::function_timer`].
pub type StatsdFunctionTimer<I> = FunctionTimer<I, StatsdLineBuilder, SharedSink>;

/// Unit registry-built timers read totals in. StatsD `|ms` lines carry milliseconds.
pub const STATSD_TIME_UNIT: TimeUnit = TimeUnit::Milliseconds;

impl<I, E, S> Pollable for FunctionTimer<I, E, S>
where
    I: CumulativeInstrument,
    E: LineEncoder,
    S: LineSink,
{
    fn id(&self) -> &MeterId {
        FunctionTimer::id(self)
    }

    fn poll(&self) -> BridgeResult<()> {
        FunctionTimer::poll(self)
    }
}

/// Owns every registered meter and polls them together.
pub struct StatsdRegistry {
    config: StatsdConfig,
    sink: SharedSink,
    meters: RwLock<Vec<Arc<dyn Pollable>>>,
}

impl StatsdRegistry {
    /// Create an empty registry publishing to `sink`.
    pub fn new(config: StatsdConfig, sink: SharedSink) -> Self {
        info!(
            flavor = %config.flavor,
            enabled = config.enabled,
            "Creating StatsD registry"
        );
        Self {
            config,
            sink,
            meters: RwLock::new(Vec::new()),
        }
    }

    /// Line protocol configuration.
    pub fn config(&self) -> &StatsdConfig {
        &self.config
    }

    /// Whether polling emits lines.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Register a function timer over `instrument`.
    ///
    /// Totals are read in milliseconds to match the `|ms` line type.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DuplicateMeter`] if `id` is already registered.
    pub fn function_timer<I>(
        &self,
        id: MeterId,
        instrument: I,
    ) -> BridgeResult<Arc<StatsdFunctionTimer<I>>>
    where
        I: CumulativeInstrument + 'static,
    {
        let encoder = StatsdLineBuilder::new(&id, self.config.flavor, self.config.prefix.as_deref());
        let timer = Arc::new(FunctionTimer::new(
            id,
            instrument,
            STATSD_TIME_UNIT,
            encoder,
            Arc::clone(&self.sink),
        ));

        self.register(Arc::clone(&timer) as Arc<dyn Pollable>)?;
        Ok(timer)
    }

    /// Register an already built meter, such as a function timer with its
    /// own encoder or sink.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DuplicateMeter`] if the meter's id is already registered.
    pub fn register(&self, meter: Arc<dyn Pollable>) -> BridgeResult<()> {
        let mut meters = self.meters.write().unwrap_or_else(PoisonError::into_inner);
        if meters.iter().any(|m| m.id() == meter.id()) {
            return Err(BridgeError::DuplicateMeter(meter.id().to_string()));
        }

        debug!(meter = %meter.id(), "Registered meter");
        meters.push(meter);
        Ok(())
    }

    /// Poll every registered meter once.
    ///
    /// A failing meter does not stop the others from being polled.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub fn poll_all(&self) -> BridgeResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        // Poll outside the lock so registration never waits on the sink.
        let meters: Vec<Arc<dyn Pollable>> = self
            .meters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut first_error = None;
        for meter in &meters {
            if let Err(e) = meter.poll() {
                warn!(meter = %meter.id(), error = %e, "Poll failed");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Ids of every registered meter in registration order.
    pub fn meter_ids(&self) -> Vec<MeterId> {
        self.meters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|m| m.id().clone())
            .collect()
    }

    /// Number of registered meters.
    pub fn len(&self) -> usize {
        self.meters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no meter is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for StatsdRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsdRegistry")
            .field("config", &self.config)
            .field("meters", &self.meter_ids())
            .finish_non_exhaustive()
    }
}
