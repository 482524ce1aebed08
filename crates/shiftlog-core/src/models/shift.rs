//! Shift model

use serde::{Deserialize, Serialize};

use super::{uuid_id, LocationPoint, Note, PairCode, PhotoEvent};
use crate::geo::{filter_jitter, trail_length_meters, Geofence, JitterThresholds};

uuid_id!(
    /// A unique identifier for a shift, using UUID v7 (time-sortable)
    ShiftId
);

/// One work shift on this device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: ShiftId,
    pub staff_name: String,
    pub site_name: String,
    /// Public correlation key for the remote live view
    pub pair_code: PairCode,
    /// Start timestamp (Unix ms)
    pub start_time: i64,
    /// End timestamp (Unix ms), set when the shift is ended
    pub end_time: Option<i64>,
    pub active: bool,
    pub locations: Vec<LocationPoint>,
    pub photos: Vec<PhotoEvent>,
    pub notes: Vec<Note>,
    /// Optional site boundary; crossings are recorded as notes
    #[serde(default)]
    pub geofence: Option<Geofence>,
    /// Last point handed to the sync queue, for outbound jitter filtering
    #[serde(default)]
    pub last_published: Option<LocationPoint>,
}

/// Derived figures for display and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShiftSummary {
    pub duration_ms: i64,
    /// Length of the jitter-filtered trail in metres
    pub trail_length_meters: f64,
    pub location_count: usize,
    pub photo_count: usize,
    pub note_count: usize,
}

impl Shift {
    /// Create a new active shift whose trail starts at `location`.
    #[must_use]
    pub fn begin(
        staff_name: impl Into<String>,
        site_name: impl Into<String>,
        pair_code: PairCode,
        location: LocationPoint,
        start_time: i64,
    ) -> Self {
        Self {
            id: ShiftId::new(),
            staff_name: staff_name.into(),
            site_name: site_name.into(),
            pair_code,
            start_time,
            end_time: None,
            active: true,
            locations: vec![location],
            photos: Vec::new(),
            notes: Vec::new(),
            geofence: None,
            last_published: None,
        }
    }

    /// Most recent location sample, if any.
    pub fn latest_location(&self) -> Option<&LocationPoint> {
        self.locations.last()
    }

    /// Summarize the shift; an active shift is measured up to `now`.
    #[must_use]
    pub fn summary(&self, thresholds: JitterThresholds, now: i64) -> ShiftSummary {
        let end = self.end_time.unwrap_or(now);
        let trail = filter_jitter(&self.locations, thresholds);
        ShiftSummary {
            duration_ms: end.saturating_sub(self.start_time).max(0),
            trail_length_meters: trail_length_meters(&trail),
            location_count: self.locations.len(),
            photo_count: self.photos.len(),
            note_count: self.notes.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(latitude: f64, timestamp: i64) -> LocationPoint {
        LocationPoint::at(latitude, -0.1, 5.0, timestamp).unwrap()
    }

    #[test]
    fn begin_starts_active_with_initial_point() {
        let shift = Shift::begin(
            "Alice",
            "Warehouse A",
            PairCode::generate(),
            point(51.5, 1_000),
            1_000,
        );
        assert!(shift.active);
        assert_eq!(shift.locations.len(), 1);
        assert_eq!(shift.end_time, None);
        assert_eq!(shift.latest_location().unwrap().timestamp, 1_000);
    }

    #[test]
    fn summary_measures_filtered_trail() {
        let mut shift = Shift::begin("Bob", "Depot", PairCode::generate(), point(51.5, 0), 0);
        shift.locations.push(point(51.501, 60_000));
        shift.locations.push(point(51.502, 120_000));
        shift.end_time = Some(180_000);

        let summary = shift.summary(JitterThresholds::default(), 999_999);
        assert_eq!(summary.duration_ms, 180_000);
        assert_eq!(summary.location_count, 3);
        assert!((summary.trail_length_meters - 222.4).abs() < 1.0);
    }

    #[test]
    fn serde_defaults_optional_fields() {
        let shift = Shift::begin("Cy", "Yard", PairCode::generate(), point(51.5, 0), 0);
        let mut json = serde_json::to_value(&shift).unwrap();
        let object = json.as_object_mut().unwrap();
        object.remove("geofence");
        object.remove("last_published");
        let parsed: Shift = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, shift);
    }
}
