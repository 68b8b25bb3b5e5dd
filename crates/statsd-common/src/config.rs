//! Configuration structures for the StatsD bridge.
//!
//! Supports TOML deserialization with sensible defaults for
//! development and explicit values for production deployment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Line protocol configuration.
    pub statsd: StatsdConfig,

    /// Poll scheduling configuration.
    pub polling: PollingConfig,

    /// Load simulation used by the daemon.
    pub simulation: SimulationConfig,
}

/// StatsD line protocol configuration.
///
/// Timings are always published in milliseconds, the unit of the `|ms` type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatsdConfig {
    /// Emit lines at all. A disabled registry still accepts meters.
    pub enabled: bool,

    /// Line dialect understood by the receiving daemon.
    pub flavor: StatsdFlavor,

    /// Optional prefix prepended to every meter name.
    pub prefix: Option<String>,
}

impl Default for StatsdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            flavor: StatsdFlavor::Datadog,
            prefix: None,
        }
    }
}

/// StatsD line dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatsdFlavor {
    /// Plain Etsy StatsD: tags are folded into the dotted name.
    Etsy,
    /// DogStatsD: `|#key:value` tag suffix.
    #[default]
    Datadog,
    /// Telegraf StatsD input: InfluxDB-style `,key=value` tags.
    Telegraf,
    /// Sysdig: `#key=value` tags after the name.
    Sysdig,
}

impl fmt::Display for StatsdFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Etsy => write!(f, "etsy"),
            Self::Datadog => write!(f, "datadog"),
            Self::Telegraf => write!(f, "telegraf"),
            Self::Sysdig => write!(f, "sysdig"),
        }
    }
}

impl std::str::FromStr for StatsdFlavor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "etsy" => Ok(Self::Etsy),
            "datadog" => Ok(Self::Datadog),
            "telegraf" => Ok(Self::Telegraf),
            "sysdig" => Ok(Self::Sysdig),
            other => Err(ConfigError::Invalid(format!("unknown StatsD flavor: {other}"))),
        }
    }
}

/// Poll scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Interval between poll cycles.
    #[serde(with = "humantime_serde")]
    pub frequency: Duration,

    /// Run one last poll when the scheduler stops so no delta is stranded.
    pub final_poll_on_stop: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            frequency: Duration::from_secs(10),
            final_poll_on_stop: true,
        }
    }
}

/// Synthetic load driven into simulated timers by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Timers to create and feed.
    pub timers: Vec<SimulatedTimer>,

    /// Operations recorded into each timer per tick.
    pub events_per_tick: u32,

    /// Mean duration of a simulated operation.
    #[serde(with = "humantime_serde")]
    pub mean_duration: Duration,

    /// Interval between simulation ticks.
    #[serde(with = "humantime_serde")]
    pub tick: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timers: vec![SimulatedTimer {
                name: String::from("bridge.simulated.requests"),
                tags: BTreeMap::new(),
            }],
            events_per_tick: 3,
            mean_duration: Duration::from_millis(25),
            tick: Duration::from_secs(1),
        }
    }
}

/// One simulated timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedTimer {
    /// Meter name.
    pub name: String,
    /// Meter tags.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl BridgeConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check values serde cannot reject on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polling.frequency.is_zero() {
            return Err(ConfigError::Invalid(
                "polling.frequency must be greater than zero".into(),
            ));
        }
        if self.simulation.tick.is_zero() {
            return Err(ConfigError::Invalid(
                "simulation.tick must be greater than zero".into(),
            ));
        }
        if let Some(timer) = self.simulation.timers.iter().find(|t| t.name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "simulated timer name must not be empty (tags: {:?})",
                timer.tags
            )));
        }
        Ok(())
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but is not usable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
