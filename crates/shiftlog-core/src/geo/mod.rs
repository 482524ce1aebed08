//! Geospatial trail processing.
//!
//! Pure functions over coordinates: great-circle distance, GPS jitter
//! filtering, the fixed-point polyline codec, and circular geofences.
//! Nothing in here touches the store or the network.

mod distance;
mod geofence;
mod jitter;
mod polyline;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use distance::{distance_meters, trail_length_meters, EARTH_RADIUS_METERS};
pub use geofence::{
    has_entered, has_left, is_inside_geofence, transition, Geofence, GeofenceTransition,
};
pub use jitter::{filter_jitter, should_publish, JitterThresholds};
pub use polyline::{decode_polyline, encode_polyline};

/// A validated WGS84 latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting NaN, infinities, and out-of-range values.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        validate_coordinate(latitude, longitude)?;
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Anything with a position on the globe.
pub trait Position {
    fn coordinate(&self) -> Coordinate;
}

/// A position with a reported horizontal accuracy radius in metres.
pub trait Sample: Position {
    fn accuracy_meters(&self) -> f64;
}

impl Position for Coordinate {
    fn coordinate(&self) -> Coordinate {
        *self
    }
}

/// Reject coordinates that are not finite or fall outside WGS84 bounds.
pub fn validate_coordinate(latitude: f64, longitude: f64) -> Result<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(Error::validation(format!(
            "latitude must be a finite value in [-90, 90], got {latitude}"
        )));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(Error::validation(format!(
            "longitude must be a finite value in [-180, 180], got {longitude}"
        )));
    }
    Ok(())
}
