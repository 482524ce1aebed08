//! Sync queue items

use serde::{Deserialize, Serialize};

use super::{uuid_id, LocationPoint, Note, PairCode, PhotoEvent};
use crate::util::now_millis;

uuid_id!(
    /// Identifier of one queued delivery
    QueueItemId
);

/// What a queued item delivers. Serialized with a `kind` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SyncPayload {
    ShiftStart {
        pair_code: PairCode,
        staff_name: String,
        site_name: String,
        start_time: i64,
    },
    LocationBatch {
        pair_code: PairCode,
        points: Vec<LocationPoint>,
    },
    Photo {
        pair_code: PairCode,
        photo: PhotoEvent,
    },
    Note {
        pair_code: PairCode,
        note: Note,
    },
    ShiftEnd {
        pair_code: PairCode,
        end_time: i64,
    },
}

/// Discriminant of [`SyncPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncKind {
    ShiftStart,
    LocationBatch,
    Photo,
    Note,
    ShiftEnd,
}

impl SyncKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ShiftStart => "shift-start",
            Self::LocationBatch => "location-batch",
            Self::Photo => "photo",
            Self::Note => "note",
            Self::ShiftEnd => "shift-end",
        }
    }
}

impl SyncPayload {
    pub const fn kind(&self) -> SyncKind {
        match self {
            Self::ShiftStart { .. } => SyncKind::ShiftStart,
            Self::LocationBatch { .. } => SyncKind::LocationBatch,
            Self::Photo { .. } => SyncKind::Photo,
            Self::Note { .. } => SyncKind::Note,
            Self::ShiftEnd { .. } => SyncKind::ShiftEnd,
        }
    }

    pub const fn pair_code(&self) -> &PairCode {
        match self {
            Self::ShiftStart { pair_code, .. }
            | Self::LocationBatch { pair_code, .. }
            | Self::Photo { pair_code, .. }
            | Self::Note { pair_code, .. }
            | Self::ShiftEnd { pair_code, .. } => pair_code,
        }
    }
}

/// An outbound event awaiting remote acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueItem {
    pub id: QueueItemId,
    pub payload: SyncPayload,
    /// Enqueue timestamp (Unix ms)
    pub created_at: i64,
    /// Failed delivery attempts so far
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl SyncQueueItem {
    #[must_use]
    pub fn new(payload: SyncPayload) -> Self {
        Self {
            id: QueueItemId::new(),
            payload,
            created_at: now_millis(),
            attempts: 0,
            last_error: None,
        }
    }

    pub const fn kind(&self) -> SyncKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_item_has_no_attempts() {
        let item = SyncQueueItem::new(SyncPayload::ShiftEnd {
            pair_code: PairCode::generate(),
            end_time: 5,
        });
        assert_eq!(item.attempts, 0);
        assert_eq!(item.last_error, None);
        assert_eq!(item.kind(), SyncKind::ShiftEnd);
    }

    #[test]
    fn payload_is_tagged_by_kind() {
        let payload = SyncPayload::LocationBatch {
            pair_code: PairCode::parse("HK7M2P").unwrap(),
            points: vec![LocationPoint::at(51.5, -0.1, 5.0, 1).unwrap()],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "location-batch");
        assert_eq!(json["pair_code"], "HK7M2P");
        assert_eq!(payload.kind().as_str(), "location-batch");
    }
}
