use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;

use crate::watermark::WatermarkBounds;
use crate::{Error, Result};

/// Seconds between the start of two cycles.
const ENV_FREQUENCY: &str = "TIDEMARK_FREQUENCY";
/// Lookback, in seconds, of an instance without a stored watermark.
const ENV_START_AT: &str = "TIDEMARK_START_AT";
/// Oldest point, in seconds before now, a stored watermark may resume from.
const ENV_IGNORE_OLDER_THAN: &str = "TIDEMARK_IGNORE_OLDER_THAN";
const ENV_CHUNK_SIZE: &str = "TIDEMARK_CHUNK_SIZE";
/// Days a day-bucketed checkpoint stays valid before rolling forward.
const ENV_DEBOUNCE_TIME_DELTA: &str = "TIDEMARK_DEBOUNCE_TIME_DELTA";

/// Upper bound of every lookback setting, about a century.
const MAX_LOOKBACK_DAYS: u32 = 36_500;
const MAX_LOOKBACK: Duration = Duration::from_secs(MAX_LOOKBACK_DAYS as u64 * 24 * 3600);

/// Environment variables, as handed to the `load` functions.
#[derive(Debug, Clone, Default)]
pub(crate) struct EnvVars(HashMap<String, String>);

impl EnvVars {
    pub(crate) fn new(
        env_vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        Self(
            env_vars
                .into_iter()
                .map(|(key, val)| (key.into(), val.into()))
                .collect(),
        )
    }

    /// Unset and blank variables are treated alike.
    pub(crate) fn optional(&self, var: &str) -> Option<&str> {
        self.0
            .get(var)
            .map(|val| val.trim())
            .filter(|val| !val.is_empty())
    }

    pub(crate) fn required(&self, var: &str) -> Result<&str> {
        self.optional(var)
            .ok_or_else(|| Error::Config(format!("Environment variable {var} is not set")))
    }

    pub(crate) fn parsed<T>(&self, var: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.optional(var)
            .map(|val| {
                val.parse::<T>()
                    .map_err(|e| Error::Config(format!("Invalid value {val} for {var}: {e}")))
            })
            .transpose()
    }

    fn seconds(&self, var: &str) -> Result<Option<Duration>> {
        Ok(self.parsed::<u64>(var)?.map(Duration::from_secs))
    }
}

/// Cadence and lookback settings shared by every collector.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    pub frequency: Duration,
    pub start_at: Duration,
    pub ignore_older_than: Duration,
    pub chunk_size: usize,
    /// In days.
    pub debounce_time_delta: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            frequency: Duration::from_secs(60),
            start_at: Duration::from_secs(24 * 3600),
            ignore_older_than: Duration::from_secs(7 * 24 * 3600),
            chunk_size: 1000,
            debounce_time_delta: 1,
        }
    }
}

impl CollectorConfig {
    /// Overrides `defaults` with the `TIDEMARK_*` variables found in `env_vars`.
    pub fn load(
        env_vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
        defaults: CollectorConfig,
    ) -> Result<Self> {
        let env = EnvVars::new(env_vars);

        let config = Self {
            frequency: env.seconds(ENV_FREQUENCY)?.unwrap_or(defaults.frequency),
            start_at: env.seconds(ENV_START_AT)?.unwrap_or(defaults.start_at),
            ignore_older_than: env
                .seconds(ENV_IGNORE_OLDER_THAN)?
                .unwrap_or(defaults.ignore_older_than),
            chunk_size: env.parsed(ENV_CHUNK_SIZE)?.unwrap_or(defaults.chunk_size),
            debounce_time_delta: env
                .parsed(ENV_DEBOUNCE_TIME_DELTA)?
                .unwrap_or(defaults.debounce_time_delta),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config(format!("{ENV_CHUNK_SIZE} must be positive")));
        }
        for (var, lookback) in [
            (ENV_START_AT, self.start_at),
            (ENV_IGNORE_OLDER_THAN, self.ignore_older_than),
        ] {
            if lookback > MAX_LOOKBACK {
                return Err(Error::Config(format!(
                    "{var} ({}s) exceeds {}s",
                    lookback.as_secs(),
                    MAX_LOOKBACK.as_secs()
                )));
            }
        }
        if self.debounce_time_delta > MAX_LOOKBACK_DAYS {
            return Err(Error::Config(format!(
                "{ENV_DEBOUNCE_TIME_DELTA} ({}) exceeds {MAX_LOOKBACK_DAYS} days",
                self.debounce_time_delta
            )));
        }
        // a first run must already sit inside the resumable window
        if self.start_at > self.ignore_older_than {
            return Err(Error::Config(format!(
                "start_at ({:?}) exceeds ignore_older_than ({:?})",
                self.start_at, self.ignore_older_than
            )));
        }
        Ok(())
    }

    pub fn bounds(&self) -> Result<WatermarkBounds> {
        let to_delta = |duration: Duration| {
            TimeDelta::from_std(duration)
                .map_err(|e| Error::Config(format!("Duration {duration:?} out of range: {e}")))
        };
        Ok(WatermarkBounds {
            start_at: to_delta(self.start_at)?,
            ignore_older_than: to_delta(self.ignore_older_than)?,
        })
    }
}
