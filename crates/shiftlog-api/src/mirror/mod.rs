//! Server-side shift mirror
//!
//! Every ingestion call is an idempotent upsert keyed by pair code plus a
//! per-event dedupe key, so the device can resend anything any number of
//! times. Events may arrive before their shift; they create a placeholder
//! shift row that the later shift upsert fills in.

mod migrations;

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use shiftlog_core::geo::encode_polyline;
use shiftlog_core::util::now_millis;
use shiftlog_core::wire::{
    LocationRequest, NoteRequest, PhotoRequest, ProjectedLocation, ProjectedNote,
    ProjectedPhoto, ShiftEndRequest, ShiftProjection, ShiftRequest,
};
use shiftlog_core::Result;

pub struct MirrorStore {
    conn: Connection,
}

impl MirrorStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&mut conn)?;
        Ok(Self { conn })
    }

    /// Record shift metadata. Returns `false` when nothing changed.
    pub fn upsert_shift(&mut self, shift: &ShiftRequest) -> Result<bool> {
        let changed = self.conn.execute(
            "INSERT INTO mirror_shifts (pair_code, staff_name, site_name, start_time, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(pair_code) DO UPDATE SET
                staff_name = excluded.staff_name,
                site_name = excluded.site_name,
                start_time = excluded.start_time,
                updated_at = excluded.updated_at
             WHERE mirror_shifts.staff_name IS NOT excluded.staff_name
                OR mirror_shifts.site_name IS NOT excluded.site_name
                OR mirror_shifts.start_time IS NOT excluded.start_time",
            params![
                shift.pair_code,
                shift.staff_name,
                shift.site_name,
                shift.start_time,
                now_millis()
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn add_location_point(&mut self, location: &LocationRequest) -> Result<bool> {
        let dedupe_key = format!(
            "{}:{}:{}",
            location.timestamp, location.latitude, location.longitude
        );
        let tx = self.conn.transaction()?;
        ensure_shift(&tx, &location.pair_code)?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO mirror_locations
                (pair_code, dedupe_key, latitude, longitude, accuracy, timestamp, address)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                location.pair_code,
                dedupe_key,
                location.latitude,
                location.longitude,
                location.accuracy,
                location.timestamp,
                location.address
            ],
        )?;
        tx.commit()?;
        Ok(inserted > 0)
    }

    /// Record a photo. A repeat that carries image bytes fills in a row
    /// stored without them.
    pub fn add_photo(&mut self, photo: &PhotoRequest, image: Option<&[u8]>) -> Result<bool> {
        let dedupe_key = photo
            .event_id
            .clone()
            .unwrap_or_else(|| format!("{}:{}", photo.timestamp, photo.photo_ref));
        let tx = self.conn.transaction()?;
        ensure_shift(&tx, &photo.pair_code)?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO mirror_photos
                (photo_id, pair_code, dedupe_key, event_id, photo_ref, timestamp,
                 latitude, longitude, address, image)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                uuid::Uuid::now_v7().to_string(),
                photo.pair_code,
                dedupe_key,
                photo.event_id,
                photo.photo_ref,
                photo.timestamp,
                photo.latitude,
                photo.longitude,
                photo.address,
                image
            ],
        )?;
        let filled = if inserted == 0 && image.is_some() {
            tx.execute(
                "UPDATE mirror_photos SET image = ?3
                 WHERE pair_code = ?1 AND dedupe_key = ?2 AND image IS NULL",
                params![photo.pair_code, dedupe_key, image],
            )?
        } else {
            0
        };
        tx.commit()?;
        Ok(inserted > 0 || filled > 0)
    }

    pub fn add_note(&mut self, note: &NoteRequest) -> Result<bool> {
        let dedupe_key = note
            .event_id
            .clone()
            .unwrap_or_else(|| format!("{}:{}", note.timestamp, note.text));
        let tx = self.conn.transaction()?;
        ensure_shift(&tx, &note.pair_code)?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO mirror_notes
                (pair_code, dedupe_key, event_id, text, timestamp, latitude, longitude)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                note.pair_code,
                dedupe_key,
                note.event_id,
                note.text,
                note.timestamp,
                note.latitude,
                note.longitude
            ],
        )?;
        tx.commit()?;
        Ok(inserted > 0)
    }

    /// Mark a shift ended. The first recorded end time wins.
    pub fn end_shift(&mut self, end: &ShiftEndRequest) -> Result<bool> {
        let tx = self.conn.transaction()?;
        ensure_shift(&tx, &end.pair_code)?;
        let updated = tx.execute(
            "UPDATE mirror_shifts SET end_time = ?2, updated_at = ?3
             WHERE pair_code = ?1 AND end_time IS NULL",
            params![end.pair_code, end.end_time, now_millis()],
        )?;
        tx.commit()?;
        Ok(updated > 0)
    }

    /// Build the live view. Lists are ordered by their embedded timestamps.
    pub fn get_shift_by_pair_code(&self, pair_code: &str) -> Result<Option<ShiftProjection>> {
        let shift = self
            .conn
            .query_row(
                "SELECT staff_name, site_name, start_time, end_time
                 FROM mirror_shifts WHERE pair_code = ?1",
                params![pair_code],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((staff_name, site_name, start_time, end_time)) = shift else {
            return Ok(None);
        };

        let locations = self.locations(pair_code)?;
        let photos = self.photos(pair_code)?;
        let notes = self.notes(pair_code)?;

        Ok(Some(ShiftProjection {
            pair_code: pair_code.to_string(),
            staff_name,
            site_name,
            start_time,
            end_time,
            active: end_time.is_none(),
            latest_location: locations.last().cloned(),
            trail_polyline: encode_polyline(&locations),
            locations,
            photos,
            notes,
        }))
    }

    /// Stored JPEG bytes for one photo of a shift.
    pub fn photo_image(&self, pair_code: &str, photo_id: &str) -> Result<Option<Vec<u8>>> {
        let image = self
            .conn
            .query_row(
                "SELECT image FROM mirror_photos WHERE pair_code = ?1 AND photo_id = ?2",
                params![pair_code, photo_id],
                |row| row.get::<_, Option<Vec<u8>>>(0),
            )
            .optional()?;
        Ok(image.flatten())
    }

    fn locations(&self, pair_code: &str) -> Result<Vec<ProjectedLocation>> {
        let mut stmt = self.conn.prepare(
            "SELECT latitude, longitude, accuracy, timestamp, address
             FROM mirror_locations WHERE pair_code = ?1 ORDER BY timestamp, id",
        )?;
        let rows = stmt.query_map(params![pair_code], |row| {
            Ok(ProjectedLocation {
                latitude: row.get(0)?,
                longitude: row.get(1)?,
                accuracy: row.get(2)?,
                timestamp: row.get(3)?,
                address: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn photos(&self, pair_code: &str) -> Result<Vec<ProjectedPhoto>> {
        let mut stmt = self.conn.prepare(
            "SELECT photo_id, event_id, photo_ref, timestamp, latitude, longitude, address,
                    image IS NOT NULL
             FROM mirror_photos WHERE pair_code = ?1 ORDER BY timestamp, id",
        )?;
        let rows = stmt.query_map(params![pair_code], |row| {
            Ok(ProjectedPhoto {
                photo_id: row.get(0)?,
                event_id: row.get(1)?,
                photo_ref: row.get(2)?,
                timestamp: row.get(3)?,
                latitude: row.get(4)?,
                longitude: row.get(5)?,
                address: row.get(6)?,
                has_image: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn notes(&self, pair_code: &str) -> Result<Vec<ProjectedNote>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, text, timestamp, latitude, longitude
             FROM mirror_notes WHERE pair_code = ?1 ORDER BY timestamp, id",
        )?;
        let rows = stmt.query_map(params![pair_code], |row| {
            Ok(ProjectedNote {
                event_id: row.get(0)?,
                text: row.get(1)?,
                timestamp: row.get(2)?,
                latitude: row.get(3)?,
                longitude: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

/// Create a placeholder row so events can arrive before their shift.
fn ensure_shift(tx: &Transaction<'_>, pair_code: &str) -> rusqlite::Result<()> {
    let now = now_millis();
    tx.execute(
        "INSERT OR IGNORE INTO mirror_shifts (pair_code, created_at, updated_at) VALUES (?1, ?2, ?2)",
        params![pair_code, now],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CODE: &str = "HK7M2P";

    fn store() -> MirrorStore {
        MirrorStore::open_in_memory().unwrap()
    }

    fn shift_request() -> ShiftRequest {
        ShiftRequest {
            pair_code: CODE.to_string(),
            staff_name: "Alice".to_string(),
            site_name: "Warehouse A".to_string(),
            start_time: 1_000,
        }
    }

    fn location(timestamp: i64, latitude: f64) -> LocationRequest {
        LocationRequest {
            pair_code: CODE.to_string(),
            latitude,
            longitude: -0.1,
            accuracy: 5.0,
            timestamp,
            address: None,
        }
    }

    fn note(event_id: Option<&str>, timestamp: i64, text: &str) -> NoteRequest {
        NoteRequest {
            pair_code: CODE.to_string(),
            event_id: event_id.map(str::to_string),
            text: text.to_string(),
            timestamp,
            latitude: None,
            longitude: None,
        }
    }

    fn photo(event_id: &str, timestamp: i64) -> PhotoRequest {
        PhotoRequest {
            pair_code: CODE.to_string(),
            event_id: Some(event_id.to_string()),
            photo_ref: "/photos/1.jpg".to_string(),
            latitude: Some(51.5),
            longitude: Some(-0.1),
            timestamp,
            address: None,
            image_base64: None,
        }
    }

    #[test]
    fn repeated_shift_upsert_is_not_applied_twice() {
        let mut store = store();
        assert!(store.upsert_shift(&shift_request()).unwrap());
        assert!(!store.upsert_shift(&shift_request()).unwrap());

        let projection = store.get_shift_by_pair_code(CODE).unwrap().unwrap();
        assert_eq!(projection.staff_name.as_deref(), Some("Alice"));
        assert!(projection.active);
    }

    #[test]
    fn identical_locations_yield_one_point() {
        let mut store = store();
        store.upsert_shift(&shift_request()).unwrap();
        assert!(store.add_location_point(&location(2_000, 51.5)).unwrap());
        assert!(!store.add_location_point(&location(2_000, 51.5)).unwrap());

        let projection = store.get_shift_by_pair_code(CODE).unwrap().unwrap();
        assert_eq!(projection.locations.len(), 1);
    }

    #[test]
    fn notes_dedupe_by_event_id_then_content() {
        let mut store = store();
        assert!(store.add_note(&note(Some("e1"), 5, "gate")).unwrap());
        assert!(!store.add_note(&note(Some("e1"), 5, "gate")).unwrap());
        assert!(store.add_note(&note(None, 6, "fence")).unwrap());
        assert!(!store.add_note(&note(None, 6, "fence")).unwrap());
        assert!(store.add_note(&note(None, 6, "other")).unwrap());

        let projection = store.get_shift_by_pair_code(CODE).unwrap().unwrap();
        assert_eq!(projection.notes.len(), 3);
    }

    #[test]
    fn events_before_shift_create_placeholder() {
        let mut store = store();
        store.add_location_point(&location(3_000, 51.6)).unwrap();

        let placeholder = store.get_shift_by_pair_code(CODE).unwrap().unwrap();
        assert_eq!(placeholder.staff_name, None);
        assert_eq!(placeholder.locations.len(), 1);

        assert!(store.upsert_shift(&shift_request()).unwrap());
        let filled = store.get_shift_by_pair_code(CODE).unwrap().unwrap();
        assert_eq!(filled.site_name.as_deref(), Some("Warehouse A"));
        assert_eq!(filled.locations.len(), 1);
    }

    #[test]
    fn first_end_time_wins() {
        let mut store = store();
        store.upsert_shift(&shift_request()).unwrap();
        let end = |end_time| ShiftEndRequest {
            pair_code: CODE.to_string(),
            end_time,
        };
        assert!(store.end_shift(&end(9_000)).unwrap());
        assert!(!store.end_shift(&end(9_500)).unwrap());

        let projection = store.get_shift_by_pair_code(CODE).unwrap().unwrap();
        assert_eq!(projection.end_time, Some(9_000));
        assert!(!projection.active);
    }

    #[test]
    fn projection_sorts_by_timestamp_and_encodes_trail() {
        let mut store = store();
        store.upsert_shift(&shift_request()).unwrap();
        store.add_location_point(&location(3_000, 51.502)).unwrap();
        store.add_location_point(&location(1_000, 51.500)).unwrap();
        store.add_location_point(&location(2_000, 51.501)).unwrap();

        let projection = store.get_shift_by_pair_code(CODE).unwrap().unwrap();
        let times: Vec<i64> = projection.locations.iter().map(|l| l.timestamp).collect();
        assert_eq!(times, vec![1_000, 2_000, 3_000]);
        assert_eq!(
            projection.latest_location.map(|l| l.timestamp),
            Some(3_000)
        );
        let decoded = shiftlog_core::geo::decode_polyline(&projection.trail_polyline).unwrap();
        assert_eq!(decoded.len(), 3);
        assert!((decoded[2].latitude - 51.502).abs() < 1e-5);
    }

    #[test]
    fn photo_image_is_filled_by_later_delivery() {
        let mut store = store();
        assert!(store.add_photo(&photo("p1", 10), None).unwrap());
        assert!(!store.add_photo(&photo("p1", 10), None).unwrap());
        assert!(store.add_photo(&photo("p1", 10), Some(&[0xFF, 0xD8, 0xFF])).unwrap());
        assert!(!store.add_photo(&photo("p1", 10), Some(&[0xFF, 0xD8, 0xFF])).unwrap());

        let projection = store.get_shift_by_pair_code(CODE).unwrap().unwrap();
        assert_eq!(projection.photos.len(), 1);
        assert!(projection.photos[0].has_image);

        let bytes = store
            .photo_image(CODE, &projection.photos[0].photo_id)
            .unwrap();
        assert_eq!(bytes, Some(vec![0xFF, 0xD8, 0xFF]));
        assert_eq!(store.photo_image(CODE, "missing").unwrap(), None);
    }

    #[test]
    fn unknown_pair_code_has_no_projection() {
        assert_eq!(store().get_shift_by_pair_code("ZZZZZZ").unwrap(), None);
    }

    #[test]
    fn mirror_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror.db");
        {
            let mut store = MirrorStore::open(&path).unwrap();
            store.upsert_shift(&shift_request()).unwrap();
        }
        let store = MirrorStore::open(&path).unwrap();
        assert!(store.get_shift_by_pair_code(CODE).unwrap().is_some());
    }
}
