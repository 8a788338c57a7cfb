//! Circulation policy configuration.
//!
//! # Responsibility
//! - Hold the tunable loan/fine/queue policy used by the engine.
//! - Load optional overrides from process environment.
//!
//! # Invariants
//! - Every policy value is at least 1 once `validate()` succeeded.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Milliseconds in one calendar day; all instants in core are epoch millis.
pub const MS_PER_DAY: i64 = 86_400_000;
/// Default number of days a loan may run before becoming overdue.
pub const DEFAULT_LOAN_PERIOD_DAYS: u32 = 14;
/// Fine charged per whole overdue day, in currency units.
pub const FINE_RATE_PER_DAY: u64 = 5;
/// Default per-book reservation queue capacity.
pub const DEFAULT_RESERVATION_QUEUE_CAPACITY: usize = 20;

const ENV_LOAN_PERIOD_DAYS: &str = "LIBRIS_LOAN_PERIOD_DAYS";
const ENV_FINE_RATE_PER_DAY: &str = "LIBRIS_FINE_RATE_PER_DAY";
const ENV_RESERVATION_QUEUE_CAPACITY: &str = "LIBRIS_RESERVATION_QUEUE_CAPACITY";

/// Configuration errors raised while loading or validating policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Environment value could not be parsed as an unsigned integer.
    Unparsable { key: &'static str, value: String },
    /// Value parsed but falls outside the accepted range.
    OutOfRange { key: &'static str, value: u64 },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unparsable { key, value } => {
                write!(f, "config `{key}` is not an unsigned integer: `{value}`")
            }
            Self::OutOfRange { key, value } => {
                write!(f, "config `{key}` must be >= 1, got {value}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Circulation policy knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    pub loan_period_days: u32,
    pub fine_rate_per_day: u64,
    pub reservation_queue_capacity: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            loan_period_days: DEFAULT_LOAN_PERIOD_DAYS,
            fine_rate_per_day: FINE_RATE_PER_DAY,
            reservation_queue_capacity: DEFAULT_RESERVATION_QUEUE_CAPACITY,
        }
    }
}

impl LibraryConfig {
    /// Builds config from defaults plus `LIBRIS_*` environment overrides.
    ///
    /// # Errors
    /// - Returns `ConfigError::Unparsable` for non-numeric values.
    /// - Returns `ConfigError::OutOfRange` for zero values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LibraryConfig::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = read_u64(&lookup, ENV_LOAN_PERIOD_DAYS)? {
            config.loan_period_days =
                u32::try_from(value).map_err(|_| ConfigError::OutOfRange {
                    key: ENV_LOAN_PERIOD_DAYS,
                    value,
                })?;
        }
        if let Some(value) = read_u64(&lookup, ENV_FINE_RATE_PER_DAY)? {
            config.fine_rate_per_day = value;
        }
        if let Some(value) = read_u64(&lookup, ENV_RESERVATION_QUEUE_CAPACITY)? {
            config.reservation_queue_capacity =
                usize::try_from(value).map_err(|_| ConfigError::OutOfRange {
                    key: ENV_RESERVATION_QUEUE_CAPACITY,
                    value,
                })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects zero-valued policy entries.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loan_period_days == 0 {
            return Err(ConfigError::OutOfRange {
                key: ENV_LOAN_PERIOD_DAYS,
                value: 0,
            });
        }
        if self.fine_rate_per_day == 0 {
            return Err(ConfigError::OutOfRange {
                key: ENV_FINE_RATE_PER_DAY,
                value: 0,
            });
        }
        if self.reservation_queue_capacity == 0 {
            return Err(ConfigError::OutOfRange {
                key: ENV_RESERVATION_QUEUE_CAPACITY,
                value: 0,
            });
        }
        Ok(())
    }

    /// Loan period expressed in epoch milliseconds.
    pub fn loan_period_ms(&self) -> i64 {
        i64::from(self.loan_period_days) * MS_PER_DAY
    }
}

fn read_u64<F>(lookup: &F, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| ConfigError::Unparsable {
            key,
            value: trimmed.to_string(),
        })
}
