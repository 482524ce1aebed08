use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Mirror database file; in-memory when unset
    pub db_path: Option<PathBuf>,
    pub view_rate_limit_window: Duration,
    pub view_rate_limit_per_window: u32,
    pub max_body_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "SHIFTLOG_API_BIND_ADDR", "127.0.0.1:8080");
        let db_path = optional_trimmed(&lookup, "SHIFTLOG_API_DB_PATH").map(PathBuf::from);

        let window_secs = parse_in_range(
            &lookup,
            "SHIFTLOG_API_VIEW_RATE_LIMIT_WINDOW_SECS",
            "60",
            1..=3_600,
        )?;
        let view_rate_limit_per_window = parse_in_range(
            &lookup,
            "SHIFTLOG_API_VIEW_RATE_LIMIT_PER_WINDOW",
            "120",
            1..=10_000,
        )?;
        let max_body_bytes = parse_in_range(
            &lookup,
            "SHIFTLOG_API_MAX_BODY_BYTES",
            "16777216",
            1_024..=268_435_456,
        )?;

        Ok(Self {
            bind_addr,
            db_path,
            view_rate_limit_window: Duration::from_secs(window_secs),
            view_rate_limit_per_window,
            max_body_bytes,
        })
    }
}

fn parse_in_range<T>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
    range: std::ops::RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display,
{
    let invalid = || {
        ConfigError::Invalid(format!(
            "{name} must be an integer in [{}, {}]",
            range.start(),
            range.end()
        ))
    };
    let value = value_or_default(lookup, name, default)
        .parse::<T>()
        .map_err(|_| invalid())?;
    if !range.contains(&value) {
        return Err(invalid());
    }
    Ok(value)
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn defaults_apply_without_env() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.db_path, None);
        assert_eq!(config.view_rate_limit_window, Duration::from_secs(60));
        assert_eq!(config.view_rate_limit_per_window, 120);
    }

    #[test]
    fn db_path_and_limits_are_read() {
        let config = config_from(&[
            ("SHIFTLOG_API_DB_PATH", " /var/lib/shiftlog/mirror.db "),
            ("SHIFTLOG_API_VIEW_RATE_LIMIT_PER_WINDOW", "5"),
        ])
        .unwrap();
        assert_eq!(
            config.db_path,
            Some(PathBuf::from("/var/lib/shiftlog/mirror.db"))
        );
        assert_eq!(config.view_rate_limit_per_window, 5);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = config_from(&[("SHIFTLOG_API_VIEW_RATE_LIMIT_WINDOW_SECS", "0")]).unwrap_err();
        assert!(err
            .to_string()
            .contains("SHIFTLOG_API_VIEW_RATE_LIMIT_WINDOW_SECS"));
        assert!(config_from(&[("SHIFTLOG_API_MAX_BODY_BYTES", "lots")]).is_err());
    }
}
