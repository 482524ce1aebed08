//! Circular geofences with edge-triggered transitions.

use serde::{Deserialize, Serialize};

use super::{distance_meters, Coordinate, Position};
use crate::error::{Error, Result};

/// A circular area around a site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub center: Coordinate,
    pub radius_meters: f64,
}

impl Geofence {
    pub fn new(center: Coordinate, radius_meters: f64) -> Result<Self> {
        if !radius_meters.is_finite() || radius_meters <= 0.0 {
            return Err(Error::validation(format!(
                "geofence radius must be a positive number of metres, got {radius_meters}"
            )));
        }
        Ok(Self {
            center,
            radius_meters,
        })
    }
}

/// Direction of a boundary crossing between two consecutive samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeofenceTransition {
    Entered,
    Left,
}

/// Whether a position lies inside (or on the edge of) the fence.
pub fn is_inside_geofence<P: Position + ?Sized>(point: &P, fence: &Geofence) -> bool {
    distance_meters(point, &fence.center) <= fence.radius_meters
}

pub fn has_entered<A, B>(previous: &A, current: &B, fence: &Geofence) -> bool
where
    A: Position + ?Sized,
    B: Position + ?Sized,
{
    !is_inside_geofence(previous, fence) && is_inside_geofence(current, fence)
}

pub fn has_left<A, B>(previous: &A, current: &B, fence: &Geofence) -> bool
where
    A: Position + ?Sized,
    B: Position + ?Sized,
{
    is_inside_geofence(previous, fence) && !is_inside_geofence(current, fence)
}

/// The transition between two samples, if they straddle the boundary.
pub fn transition<A, B>(previous: &A, current: &B, fence: &Geofence) -> Option<GeofenceTransition>
where
    A: Position + ?Sized,
    B: Position + ?Sized,
{
    if has_entered(previous, current, fence) {
        Some(GeofenceTransition::Entered)
    } else if has_left(previous, current, fence) {
        Some(GeofenceTransition::Left)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate::new(latitude, longitude).unwrap()
    }

    fn warehouse() -> Geofence {
        Geofence::new(coord(51.5, -0.1), 100.0).unwrap()
    }

    #[test]
    fn rejects_non_positive_radius() {
        assert!(Geofence::new(coord(0.0, 0.0), 0.0).is_err());
        assert!(Geofence::new(coord(0.0, 0.0), f64::NAN).is_err());
    }

    #[test]
    fn inside_includes_center_and_excludes_far_points() {
        let fence = warehouse();
        assert!(is_inside_geofence(&coord(51.5, -0.1), &fence));
        assert!(!is_inside_geofence(&coord(51.51, -0.1), &fence));
    }

    #[test]
    fn transitions_are_edge_triggered() {
        let fence = warehouse();
        let outside = coord(51.502, -0.1);
        let inside = coord(51.5003, -0.1);

        assert!(has_entered(&outside, &inside, &fence));
        assert!(!has_entered(&inside, &inside, &fence));
        assert!(has_left(&inside, &outside, &fence));
        assert!(!has_left(&outside, &outside, &fence));

        assert_eq!(
            transition(&outside, &inside, &fence),
            Some(GeofenceTransition::Entered)
        );
        assert_eq!(
            transition(&inside, &outside, &fence),
            Some(GeofenceTransition::Left)
        );
        assert_eq!(transition(&inside, &inside, &fence), None);
    }
}
