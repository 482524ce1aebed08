//! JSON bodies exchanged with the remote mirror.
//!
//! Shared by the client transport and the reconciler service so both ends
//! agree on field names. Everything is camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::models::{LocationPoint, Note, PairCode, PhotoEvent, SyncPayload};

/// `POST /v1/shift`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftRequest {
    pub pair_code: String,
    pub staff_name: String,
    pub site_name: String,
    pub start_time: i64,
}

/// `POST /v1/location`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRequest {
    pub pair_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// `POST /v1/photo`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRequest {
    pub pair_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub photo_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Base64 JPEG, filled in just before sending
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
}

/// `POST /v1/note`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRequest {
    pub pair_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub text: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

/// `POST /v1/shift-end`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftEndRequest {
    pub pair_code: String,
    pub end_time: i64,
}

/// Reply to every ingestion endpoint; `applied` is false for duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub applied: bool,
}

/// One outbound HTTP call.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteRequest {
    Shift(ShiftRequest),
    Location(LocationRequest),
    Photo(PhotoRequest),
    Note(NoteRequest),
    ShiftEnd(ShiftEndRequest),
}

impl RemoteRequest {
    /// Path of the endpoint this request is posted to.
    pub const fn route(&self) -> &'static str {
        match self {
            Self::Shift(_) => "/v1/shift",
            Self::Location(_) => "/v1/location",
            Self::Photo(_) => "/v1/photo",
            Self::Note(_) => "/v1/note",
            Self::ShiftEnd(_) => "/v1/shift-end",
        }
    }

    /// Expand a queued payload into the calls that deliver it, in order.
    ///
    /// A location batch becomes one call per point; photos are returned
    /// without image data.
    pub fn from_payload(payload: &SyncPayload) -> Vec<Self> {
        match payload {
            SyncPayload::ShiftStart {
                pair_code,
                staff_name,
                site_name,
                start_time,
            } => vec![Self::Shift(ShiftRequest {
                pair_code: pair_code.to_string(),
                staff_name: staff_name.clone(),
                site_name: site_name.clone(),
                start_time: *start_time,
            })],
            SyncPayload::LocationBatch { pair_code, points } => points
                .iter()
                .map(|point| Self::Location(LocationRequest::from_point(pair_code, point)))
                .collect(),
            SyncPayload::Photo { pair_code, photo } => {
                vec![Self::Photo(PhotoRequest::from_event(pair_code, photo))]
            }
            SyncPayload::Note { pair_code, note } => {
                vec![Self::Note(NoteRequest::from_note(pair_code, note))]
            }
            SyncPayload::ShiftEnd {
                pair_code,
                end_time,
            } => vec![Self::ShiftEnd(ShiftEndRequest {
                pair_code: pair_code.to_string(),
                end_time: *end_time,
            })],
        }
    }
}

impl LocationRequest {
    pub fn from_point(pair_code: &PairCode, point: &LocationPoint) -> Self {
        Self {
            pair_code: pair_code.to_string(),
            latitude: point.latitude,
            longitude: point.longitude,
            accuracy: point.accuracy,
            timestamp: point.timestamp,
            address: point.address.clone(),
        }
    }
}

impl PhotoRequest {
    pub fn from_event(pair_code: &PairCode, photo: &PhotoEvent) -> Self {
        Self {
            pair_code: pair_code.to_string(),
            event_id: Some(photo.id.to_string()),
            photo_ref: photo.file_ref.clone(),
            latitude: photo.location.as_ref().map(|point| point.latitude),
            longitude: photo.location.as_ref().map(|point| point.longitude),
            timestamp: photo.timestamp,
            address: photo.address.clone(),
            image_base64: None,
        }
    }
}

impl NoteRequest {
    pub fn from_note(pair_code: &PairCode, note: &Note) -> Self {
        Self {
            pair_code: pair_code.to_string(),
            event_id: Some(note.id.to_string()),
            text: note.text.clone(),
            timestamp: note.timestamp,
            latitude: note.location.as_ref().map(|point| point.latitude),
            longitude: note.location.as_ref().map(|point| point.longitude),
        }
    }
}

/// `GET /v1/shift/{pairCode}`: the live view of a shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftProjection {
    pub pair_code: String,
    pub staff_name: Option<String>,
    pub site_name: Option<String>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub active: bool,
    pub latest_location: Option<ProjectedLocation>,
    pub locations: Vec<ProjectedLocation>,
    /// Encoded polyline of `locations`
    pub trail_polyline: String,
    pub photos: Vec<ProjectedPhoto>,
    pub notes: Vec<ProjectedNote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl crate::geo::Position for ProjectedLocation {
    fn coordinate(&self) -> crate::geo::Coordinate {
        crate::geo::Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedPhoto {
    /// Mirror-assigned id used in the photo download path
    pub photo_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub photo_ref: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub has_image: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedNote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub text: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn code() -> PairCode {
        PairCode::parse("HK7M2P").unwrap()
    }

    #[test]
    fn location_batch_expands_per_point() {
        let payload = SyncPayload::LocationBatch {
            pair_code: code(),
            points: vec![
                LocationPoint::at(51.5, -0.1, 5.0, 1).unwrap(),
                LocationPoint::at(51.6, -0.1, 5.0, 2).unwrap(),
            ],
        };
        let requests = RemoteRequest::from_payload(&payload);
        assert_eq!(requests.len(), 2);
        assert!(requests
            .iter()
            .all(|request| request.route() == "/v1/location"));
    }

    #[test]
    fn photo_request_is_camel_case_and_carries_event_id() {
        let location = LocationPoint::at(51.5, -0.1, 4.0, 10)
            .unwrap()
            .with_address("1 Main St");
        let photo = PhotoEvent::new("/tmp/p.jpg", Some(location));
        let request = PhotoRequest::from_event(&code(), &photo);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["pairCode"], "HK7M2P");
        assert_eq!(json["photoRef"], "/tmp/p.jpg");
        assert_eq!(json["eventId"], photo.id.to_string());
        assert_eq!(json["address"], "1 Main St");
        assert!(json.get("imageBase64").is_none());
    }

    #[test]
    fn shift_end_route() {
        let requests = RemoteRequest::from_payload(&SyncPayload::ShiftEnd {
            pair_code: code(),
            end_time: 9,
        });
        assert_eq!(
            requests,
            vec![RemoteRequest::ShiftEnd(ShiftEndRequest {
                pair_code: "HK7M2P".to_string(),
                end_time: 9,
            })]
        );
        assert_eq!(requests[0].route(), "/v1/shift-end");
    }
}
