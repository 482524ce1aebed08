//! Client configuration.
//!
//! A small JSON file next to the local store. Every field has a default, so
//! a missing file or an empty object is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::JitterThresholds;
use crate::shift::ShiftSettings;
use crate::sync::{PhotoOptions, SyncWorkerConfig, DEFAULT_STORE_POLL};
use crate::util::{self, non_blank};

/// Environment variable overriding [`ClientConfig::api_base_url`].
pub const API_URL_ENV: &str = "SHIFTLOG_API_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the shiftlog API; sync is disabled without one
    pub api_base_url: Option<String>,
    pub sync_interval_secs: u64,
    pub min_move_meters: f64,
    pub max_accuracy_meters: f64,
    pub location_batch_size: usize,
    pub photo_max_edge: u32,
    pub photo_jpeg_quality: u8,
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let jitter = JitterThresholds::default();
        let photo = PhotoOptions::default();
        Self {
            api_base_url: None,
            sync_interval_secs: 30,
            min_move_meters: jitter.min_move_meters,
            max_accuracy_meters: jitter.max_accuracy_meters,
            location_batch_size: ShiftSettings::default().location_batch_size,
            photo_max_edge: photo.max_edge,
            photo_jpeg_quality: photo.jpeg_quality,
            request_timeout_secs: 20,
        }
    }
}

impl ClientConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_json(&raw),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(error) => Err(error.into()),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through an injectable lookup.
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(API_URL_ENV).as_deref().and_then(non_blank) {
            self.api_base_url = Some(url);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(url) = self.api_base_url() {
            util::api_base_url(&url)?;
        }
        if self.sync_interval_secs == 0 {
            return Err(Error::validation("sync_interval_secs must be at least 1"));
        }
        if !self.min_move_meters.is_finite() || self.min_move_meters < 0.0 {
            return Err(Error::validation("min_move_meters must be >= 0"));
        }
        if !self.max_accuracy_meters.is_finite() || self.max_accuracy_meters <= 0.0 {
            return Err(Error::validation("max_accuracy_meters must be > 0"));
        }
        if self.location_batch_size == 0 {
            return Err(Error::validation("location_batch_size must be at least 1"));
        }
        if self.photo_max_edge == 0 {
            return Err(Error::validation("photo_max_edge must be at least 1"));
        }
        if !(1..=100).contains(&self.photo_jpeg_quality) {
            return Err(Error::validation("photo_jpeg_quality must be in 1..=100"));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::validation("request_timeout_secs must be at least 1"));
        }
        Ok(())
    }

    pub fn api_base_url(&self) -> Option<String> {
        self.api_base_url.as_deref().and_then(non_blank)
    }

    pub const fn shift_settings(&self) -> ShiftSettings {
        ShiftSettings {
            jitter: JitterThresholds {
                min_move_meters: self.min_move_meters,
                max_accuracy_meters: self.max_accuracy_meters,
            },
            location_batch_size: self.location_batch_size,
        }
    }

    pub const fn worker_config(&self) -> SyncWorkerConfig {
        SyncWorkerConfig {
            interval: Duration::from_secs(self.sync_interval_secs),
            store_poll: DEFAULT_STORE_POLL,
            photo: PhotoOptions {
                max_edge: self.photo_max_edge,
                jpeg_quality: self.photo_jpeg_quality,
            },
        }
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_uses_defaults() {
        let config = ClientConfig::from_json("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.worker_config().interval, Duration::from_secs(30));
        assert_eq!(config.shift_settings(), ShiftSettings::default());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(ClientConfig::from_json(r#"{"sync_every": 5}"#).is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(ClientConfig::from_json(r#"{"api_base_url": "example.com"}"#).is_err());
        assert!(ClientConfig::from_json(r#"{"location_batch_size": 0}"#).is_err());
        assert!(ClientConfig::from_json(r#"{"photo_jpeg_quality": 0}"#).is_err());
    }

    #[test]
    fn env_override_wins_over_file() {
        let config = ClientConfig::from_json(r#"{"api_base_url": "http://file.local"}"#)
            .unwrap()
            .with_env_overrides(|key| {
                (key == API_URL_ENV).then(|| " https://env.example.com ".to_string())
            });
        assert_eq!(
            config.api_base_url().as_deref(),
            Some("https://env.example.com")
        );
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load(dir.path().join("config.json")).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"sync_interval_secs": 5, "min_move_meters": 10.0}"#).unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.sync_interval_secs, 5);
        assert!((config.shift_settings().jitter.min_move_meters - 10.0).abs() < f64::EPSILON);
    }
}
