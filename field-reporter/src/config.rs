//! Process configuration, read once at startup from the environment.
//!
//! Every setting has a default; a value that is present but unusable is a
//! startup error and keeps the scheduler from starting.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;
use time::UtcOffset;
use time::macros::format_description;

use crate::duty_cycle::{DutyCycleConfig, OperatingWindow, WindowError};
use crate::power::PowerDownMode;

pub const ENV_DEVICE_ID: &str = "FIELD_REPORTER_DEVICE_ID";
pub const ENV_START_HOUR: &str = "FIELD_REPORTER_START_HOUR";
pub const ENV_END_HOUR: &str = "FIELD_REPORTER_END_HOUR";
pub const ENV_LEAD_TIME_MIN: &str = "FIELD_REPORTER_LEAD_TIME_MIN";
pub const ENV_POLL_INTERVAL_SEC: &str = "FIELD_REPORTER_POLL_INTERVAL_SEC";
pub const ENV_API_URL: &str = "FIELD_REPORTER_API_URL";
pub const ENV_UTC_OFFSET: &str = "FIELD_REPORTER_UTC_OFFSET";
pub const ENV_MARKER_PATH: &str = "FIELD_REPORTER_MARKER_PATH";
pub const ENV_POWER_MODE: &str = "FIELD_REPORTER_POWER_MODE";

const DEFAULT_DEVICE_ID: &str = "device-001";
const DEFAULT_API_URL: &str = "http://127.0.0.1:3000/api/data";
const DEFAULT_MARKER_PATH: &str = "/var/lib/field-reporter/marker.json";

/// Longest lead time that still wakes the device inside the pre-window
/// hour.
const MAX_LEAD_TIME_MIN: u32 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name}={value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid operating window: {0}")]
    Window(#[from] WindowError),
}

#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Identity included in every record.
    pub device_id: String,

    pub duty_cycle: DutyCycleConfig,

    /// Collector URL receiving the records.
    pub api_endpoint: Url,

    /// Offset applied to the host clock to get local time.
    pub utc_offset: UtcOffset,

    /// Where the hour marker is retained across power-down.
    pub marker_path: PathBuf,

    pub power_mode: PowerDownMode,
}

impl ReporterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from `lookup`, which maps a variable name to
    /// its value when set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = DutyCycleConfig::default();

        let start_hour = parse_or(&lookup, ENV_START_HOUR, defaults.window.start_hour())?;
        let end_hour = parse_or(&lookup, ENV_END_HOUR, defaults.window.end_hour())?;
        let window = OperatingWindow::new(start_hour, end_hour)?;

        let lead_time_minutes = parse_or(&lookup, ENV_LEAD_TIME_MIN, defaults.lead_time_minutes)?;
        if lead_time_minutes > MAX_LEAD_TIME_MIN {
            return Err(invalid(
                ENV_LEAD_TIME_MIN,
                lead_time_minutes.to_string(),
                format!("must be at most {MAX_LEAD_TIME_MIN}"),
            ));
        }

        let poll_secs: u64 =
            parse_or(&lookup, ENV_POLL_INTERVAL_SEC, defaults.poll_interval.as_secs())?;
        if poll_secs == 0 {
            return Err(invalid(ENV_POLL_INTERVAL_SEC, "0".into(), "must be positive".into()));
        }

        let device_id = lookup(ENV_DEVICE_ID).unwrap_or_else(|| DEFAULT_DEVICE_ID.to_owned());
        if device_id.trim().is_empty() {
            return Err(invalid(ENV_DEVICE_ID, device_id, "must not be empty".into()));
        }

        let api_endpoint = parse_url(lookup(ENV_API_URL).as_deref().unwrap_or(DEFAULT_API_URL))?;

        let utc_offset = match lookup(ENV_UTC_OFFSET) {
            Some(value) => parse_offset(&value)?,
            None => UtcOffset::UTC,
        };

        let marker_path = lookup(ENV_MARKER_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MARKER_PATH));

        let power_mode = parse_or(&lookup, ENV_POWER_MODE, PowerDownMode::Off)?;

        Ok(Self {
            device_id,
            duty_cycle: DutyCycleConfig {
                window,
                lead_time_minutes,
                poll_interval: Duration::from_secs(poll_secs),
            },
            api_endpoint,
            utc_offset,
            marker_path,
            power_mode,
        })
    }
}

fn invalid(name: &'static str, value: String, reason: String) -> ConfigError {
    ConfigError::Invalid {
        name,
        value,
        reason,
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(name, value.clone(), e.to_string())),
    }
}

fn parse_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| invalid(ENV_API_URL, value.to_owned(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid(
            ENV_API_URL,
            value.to_owned(),
            "expected an http(s) URL with a host".into(),
        ));
    }
    Ok(url)
}

/// Parse `+HH:MM` / `-HH:MM`.
fn parse_offset(value: &str) -> Result<UtcOffset, ConfigError> {
    UtcOffset::parse(
        value.trim(),
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .map_err(|e| invalid(ENV_UTC_OFFSET, value.to_owned(), e.to_string()))
}
