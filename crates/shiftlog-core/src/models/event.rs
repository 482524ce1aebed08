//! Photo and note events recorded during a shift

use serde::{Deserialize, Serialize};

use super::{uuid_id, LocationPoint};
use crate::util::now_millis;

uuid_id!(
    /// Stable client-generated id for a photo or note, threaded through to
    /// the remote mirror as its dedupe key
    EventId
);

/// A photo taken during a shift. Only a reference to the local file is kept;
/// the image itself is prepared for upload at send time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoEvent {
    pub id: EventId,
    /// Local file reference (path on this device)
    pub file_ref: String,
    /// Capture timestamp (Unix ms)
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl PhotoEvent {
    #[must_use]
    pub fn new(file_ref: impl Into<String>, location: Option<LocationPoint>) -> Self {
        let address = location.as_ref().and_then(|point| point.address.clone());
        Self {
            id: EventId::new(),
            file_ref: file_ref.into(),
            timestamp: now_millis(),
            location,
            address,
        }
    }
}

/// A free-text note recorded during a shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: EventId,
    pub text: String,
    /// Creation timestamp (Unix ms)
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationPoint>,
}

impl Note {
    #[must_use]
    pub fn new(text: impl Into<String>, location: Option<LocationPoint>) -> Self {
        Self {
            id: EventId::new(),
            text: text.into(),
            timestamp: now_millis(),
            location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ids_are_unique_and_parse() {
        let first = EventId::new();
        let second = EventId::new();
        assert_ne!(first, second);
        let parsed: EventId = first.as_str().parse().unwrap();
        assert_eq!(first, parsed);
    }

    #[test]
    fn photo_inherits_address_from_location() {
        let location = LocationPoint::at(51.5, -0.1, 5.0, 10)
            .unwrap()
            .with_address("1 Dock Road");
        let photo = PhotoEvent::new("/tmp/a.jpg", Some(location));
        assert_eq!(photo.address.as_deref(), Some("1 Dock Road"));
    }

    #[test]
    fn note_without_location_serializes_compactly() {
        let note = Note::new("gate 3 unlocked", None);
        let json = serde_json::to_string(&note).unwrap();
        assert!(!json.contains("location"));
    }
}
