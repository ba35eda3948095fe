//! Backend configuration loaded from environment variables.
//!
//! Only `DATABASE_URL` is required. Malformed optional values are logged and
//! replaced by their defaults.

use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::{Local, NaiveDate};
use study_core::calendar::study_day;
use study_core::streak::LOOKBACK_DAYS;

use crate::error::{Result, ServiceError};

/// Longest accepted streak look-back, in days.
pub const MAX_LOOKBACK_DAYS: u32 = 3650;

/// Backend configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Env: `DATABASE_URL` (required)
    pub database_url: String,

    /// Env: `DATABASE_MAX_CONNECTIONS`
    /// Default: `10`
    pub max_connections: u32,

    /// Hour (0-23) at which a new study day begins.
    /// Env: `DAILY_RESET_HOUR`
    /// Default: `0`
    pub daily_reset_hour: u32,

    /// Days of history read by a full streak recompute, 1 to 3650.
    /// Env: `STREAK_LOOKBACK_DAYS`
    /// Default: `400`
    pub streak_lookback_days: u32,
}

impl Config {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
            daily_reset_hour: 0,
            streak_lookback_days: LOOKBACK_DAYS,
        }
    }

    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ServiceError::Config("DATABASE_URL must be set".to_string()))?;

        let mut config = Self::new(database_url);

        config.max_connections = parse_var(
            "DATABASE_MAX_CONNECTIONS",
            std::env::var("DATABASE_MAX_CONNECTIONS").ok(),
            config.max_connections,
        );

        config.daily_reset_hour = in_range(
            "DAILY_RESET_HOUR",
            parse_var(
                "DAILY_RESET_HOUR",
                std::env::var("DAILY_RESET_HOUR").ok(),
                config.daily_reset_hour,
            ),
            0..=23,
            config.daily_reset_hour,
        );

        config.streak_lookback_days = in_range(
            "STREAK_LOOKBACK_DAYS",
            parse_var(
                "STREAK_LOOKBACK_DAYS",
                std::env::var("STREAK_LOOKBACK_DAYS").ok(),
                config.streak_lookback_days,
            ),
            1..=MAX_LOOKBACK_DAYS,
            config.streak_lookback_days,
        );

        Ok(config)
    }

    /// Current study day in the local reference timezone.
    pub fn today(&self) -> Result<NaiveDate> {
        Ok(study_day(&Local::now(), self.daily_reset_hour)?)
    }
}

fn parse_var<T: FromStr + Copy>(name: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(value) => match value.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(var = name, value = %value, "Invalid value, using default");
                default
            }
        },
    }
}

fn in_range(name: &str, value: u32, range: RangeInclusive<u32>, default: u32) -> u32 {
    if range.contains(&value) {
        value
    } else {
        tracing::warn!(var = name, value, "Value out of range, using default");
        default
    }
}
