//! Scenario Parameters
//!
//! Holds the six tunable scenario parameters, applies overrides coming from
//! the command line or a scenario file, and enforces the one cross-field rule:
//! a consumer never subscribes to more streams than the producer publishes.

use std::str::FromStr;

use log::{info, warn};
use thiserror::Error;

/// Default publish ceiling. Only 32 bits wide even though the field holds a
/// u64; kept as-is, it means "publish without a practical limit".
pub const UNBOUNDED_PUBLISH_COUNT: u64 = u32::MAX as u64;

pub const FLAG_SUBSCRIBE_COUNT: &str = "sm";
pub const FLAG_MAX_PUBLISH_COUNT: &str = "pm";
pub const FLAG_DATA_STREAM_COUNT: &str = "ds";
pub const FLAG_DURATION: &str = "duration";
pub const FLAG_CONSUMER_START: &str = "c_start";
pub const FLAG_PRODUCER_START: &str = "p_start";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for --{flag}: expected {expected}")]
    InvalidValue {
        flag: String,
        value: String,
        expected: &'static str,
    },

    #[error("failed to read scenario file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scenario file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Scenario parameters, read-only once the topology is being built
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Number of subscribe messages the consumer sends
    pub subscribe_count: u32,

    /// Maximum number of messages the producer publishes
    pub max_publish_count: u64,

    /// Number of data streams the producer serves
    pub data_stream_count: u32,

    /// Global stop time in seconds
    pub duration_secs: i64,

    /// Producer start offset in seconds
    pub producer_start_secs: f64,

    /// Consumer start offset in seconds
    pub consumer_start_secs: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            subscribe_count: 100,
            max_publish_count: UNBOUNDED_PUBLISH_COUNT,
            data_stream_count: 200,
            duration_secs: 300,
            producer_start_secs: 5.0,
            consumer_start_secs: 8.0,
        }
    }
}

impl ScenarioConfig {
    /// Defaults, then every override that is set, then normalization
    pub fn from_overrides(overrides: &ScenarioOverrides) -> Self {
        let mut config = Self::default();

        if let Some(v) = overrides.sm {
            config.subscribe_count = v;
        }
        if let Some(v) = overrides.pm {
            config.max_publish_count = v;
        }
        if let Some(v) = overrides.ds {
            config.data_stream_count = v;
        }
        if let Some(v) = overrides.duration {
            config.duration_secs = v;
        }
        if let Some(v) = overrides.c_start {
            config.consumer_start_secs = v;
        }
        if let Some(v) = overrides.p_start {
            config.producer_start_secs = v;
        }

        config.normalize();
        config
    }

    /// Clamp `subscribe_count` down to `data_stream_count`.
    ///
    /// Nothing else is checked here: negative durations or zero counts pass
    /// through, and the scheduler rejects intervals that end before they start.
    pub fn normalize(&mut self) {
        if self.data_stream_count < self.subscribe_count {
            info!(
                "clamping --sm from {} to --ds {}",
                self.subscribe_count, self.data_stream_count
            );
            self.subscribe_count = self.data_stream_count;
        }
    }

    pub fn log_summary(&self) {
        info!("program arguments:");
        info!("--sm            : {}", self.subscribe_count);
        info!("--pm            : {}", self.max_publish_count);
        info!("--ds            : {}", self.data_stream_count);
        info!("--duration      : {}", self.duration_secs);
        info!("--c_start       : {}", self.consumer_start_secs);
        info!("--p_start       : {}", self.producer_start_secs);
    }
}

// ============================================================================
// Overrides
// ============================================================================

/// Optional overrides for each scenario parameter, named after their flags
#[derive(Debug, Clone, Default, PartialEq, clap::Args)]
pub struct ScenarioOverrides {
    /// Number of subscribe messages
    #[arg(long = "sm")]
    pub sm: Option<u32>,

    /// Number of max publish messages
    #[arg(long = "pm")]
    pub pm: Option<u64>,

    /// Number of data streams
    #[arg(long = "ds")]
    pub ds: Option<u32>,

    /// Duration of simulation in seconds
    #[arg(long = "duration", allow_negative_numbers = true)]
    pub duration: Option<i64>,

    /// Consumer start offset in seconds
    #[arg(long = "c_start", allow_negative_numbers = true)]
    pub c_start: Option<f64>,

    /// Producer start offset in seconds
    #[arg(long = "p_start", allow_negative_numbers = true)]
    pub p_start: Option<f64>,
}

impl ScenarioOverrides {
    /// Apply one override by flag name, coercing `value` to the flag's type.
    ///
    /// A leading `--` on the flag is accepted. Unknown flags are skipped with a
    /// warning and return `Ok(false)`.
    pub fn apply_pair(&mut self, flag: &str, value: &str) -> Result<bool, ConfigError> {
        let name = flag.strip_prefix("--").unwrap_or(flag);

        match name {
            FLAG_SUBSCRIBE_COUNT => self.sm = Some(coerce(name, value, "unsigned integer")?),
            FLAG_MAX_PUBLISH_COUNT => {
                self.pm = Some(coerce(name, value, "unsigned 64-bit integer")?)
            }
            FLAG_DATA_STREAM_COUNT => self.ds = Some(coerce(name, value, "unsigned integer")?),
            FLAG_DURATION => self.duration = Some(coerce(name, value, "integer")?),
            FLAG_CONSUMER_START => self.c_start = Some(coerce(name, value, "number")?),
            FLAG_PRODUCER_START => self.p_start = Some(coerce(name, value, "number")?),
            _ => {
                warn!("ignoring unknown parameter {:?}", flag);
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Apply a sequence of (flag, value) pairs in order
    pub fn apply_pairs<'a, I>(&mut self, pairs: I) -> Result<usize, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut applied = 0;
        for (flag, value) in pairs {
            if self.apply_pair(flag, value)? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Layer `other` on top of `self`: anything set in `other` wins
    pub fn merged_with(&self, other: &ScenarioOverrides) -> ScenarioOverrides {
        ScenarioOverrides {
            sm: other.sm.or(self.sm),
            pm: other.pm.or(self.pm),
            ds: other.ds.or(self.ds),
            duration: other.duration.or(self.duration),
            c_start: other.c_start.or(self.c_start),
            p_start: other.p_start.or(self.p_start),
        }
    }
}

fn coerce<T: FromStr>(flag: &str, value: &str, expected: &'static str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
        expected,
    })
}
