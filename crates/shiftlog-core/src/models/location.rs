//! Location sample model

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::{validate_coordinate, Coordinate, Position, Sample};
use crate::util::now_millis;

/// A single GPS sample. Immutable once appended to a shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in metres
    pub accuracy: f64,
    /// Sample timestamp (Unix ms)
    pub timestamp: i64,
    /// Reverse-geocoded address, when the platform resolved one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl LocationPoint {
    /// Create a sample stamped with the current time.
    pub fn new(latitude: f64, longitude: f64, accuracy: f64) -> Result<Self> {
        Self::at(latitude, longitude, accuracy, now_millis())
    }

    /// Create a sample with an explicit timestamp.
    pub fn at(latitude: f64, longitude: f64, accuracy: f64, timestamp: i64) -> Result<Self> {
        let point = Self {
            latitude,
            longitude,
            accuracy,
            timestamp,
            address: None,
        };
        point.validate()?;
        Ok(point)
    }

    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = crate::util::non_blank(&address.into());
        self
    }

    /// Check a point that may have been built field by field.
    pub fn validate(&self) -> Result<()> {
        validate_coordinate(self.latitude, self.longitude)?;
        if !self.accuracy.is_finite() || self.accuracy < 0.0 {
            return Err(Error::validation(format!(
                "accuracy must be a non-negative number of metres, got {}",
                self.accuracy
            )));
        }
        if self.timestamp < 0 {
            return Err(Error::validation("timestamp must not be negative"));
        }
        Ok(())
    }
}

impl Position for LocationPoint {
    fn coordinate(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

impl Sample for LocationPoint {
    fn accuracy_meters(&self) -> f64 {
        self.accuracy
    }
}
