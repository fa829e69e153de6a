use anyhow::Result;
use chrono::{FixedOffset, NaiveDate};
use std::env;

/// Grace periods used by the deviation calculator and the adjustment resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviationSettings {
    /// Late arrival allowed before a day is flagged. Default 30.
    pub allowed_late_minutes: i64,
    /// Early departure allowed before a day is flagged. Default 15.
    pub allowed_early_minutes: i64,
    /// Punches closer together than this are treated as one event. Default 15.
    pub min_session_minutes: i64,
}

impl Default for DeviationSettings {
    fn default() -> Self {
        Self {
            allowed_late_minutes: 30,
            allowed_early_minutes: 15,
            min_session_minutes: 15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PunchSourceConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub punch_source: Option<PunchSourceConfig>,
    pub local_offset: FixedOffset,
    pub deviation: DeviationSettings,
    pub link_batch_limit: usize,
    pub sync_start_date: Option<NaiveDate>,
    pub managers: Vec<String>,
    pub officers: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:attendance.db".to_string());

        let punch_source = match env::var("PUNCH_SOURCE_URL") {
            Ok(url) => {
                let username = env::var("PUNCH_SOURCE_USERNAME").map_err(|_| {
                    anyhow::anyhow!("PUNCH_SOURCE_USERNAME is required when PUNCH_SOURCE_URL is set")
                })?;
                let password = env::var("PUNCH_SOURCE_PASSWORD").map_err(|_| {
                    anyhow::anyhow!("PUNCH_SOURCE_PASSWORD is required when PUNCH_SOURCE_URL is set")
                })?;
                Some(PunchSourceConfig {
                    url: url.trim_end_matches('/').to_string(),
                    username,
                    password,
                })
            }
            Err(_) => None,
        };

        let defaults = DeviationSettings::default();
        let deviation = DeviationSettings {
            allowed_late_minutes: parse_var("ALLOWED_LATE_MINUTES", defaults.allowed_late_minutes)?,
            allowed_early_minutes: parse_var("ALLOWED_EARLY_MINUTES", defaults.allowed_early_minutes)?,
            min_session_minutes: parse_var("MIN_SESSION_MINUTES", defaults.min_session_minutes)?,
        };
        if deviation.allowed_late_minutes < 0
            || deviation.allowed_early_minutes < 0
            || deviation.min_session_minutes < 0
        {
            return Err(anyhow::anyhow!("tolerance minutes must not be negative"));
        }

        let utc_offset_minutes: i32 = parse_var("LOCAL_UTC_OFFSET_MINUTES", 120)?;
        let local_offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
            anyhow::anyhow!("LOCAL_UTC_OFFSET_MINUTES out of range: {}", utc_offset_minutes)
        })?;

        let sync_start_date = match env::var("SYNC_START_DATE") {
            Ok(value) => Some(
                NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                    .map_err(|e| anyhow::anyhow!("SYNC_START_DATE must be YYYY-MM-DD: {}", e))?,
            ),
            Err(_) => None,
        };

        Ok(Config {
            database_url,
            punch_source,
            local_offset,
            deviation,
            link_batch_limit: parse_var("LINK_BATCH_LIMIT", 30)?,
            sync_start_date,
            managers: parse_list("ATTENDANCE_MANAGERS"),
            officers: parse_list("ATTENDANCE_OFFICERS"),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, value, e)),
        Err(_) => Ok(default),
    }
}

fn parse_list(name: &str) -> Vec<String> {
    env::var(name)
        .map(|value| split_names(&value))
        .unwrap_or_default()
}

fn split_names(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
