//! Mirror schema migrations

use rusqlite::Connection;
use shiftlog_core::Result;

const CURRENT_VERSION: i32 = 1;

pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Migration to version 1: shifts and their events
///
/// Every event table carries `UNIQUE(pair_code, dedupe_key)` so repeated
/// deliveries collapse into one row.
fn migrate_v1(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS mirror_shifts (
            pair_code TEXT PRIMARY KEY,
            staff_name TEXT,
            site_name TEXT,
            start_time INTEGER,
            end_time INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS mirror_locations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pair_code TEXT NOT NULL REFERENCES mirror_shifts(pair_code),
            dedupe_key TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            accuracy REAL NOT NULL,
            timestamp INTEGER NOT NULL,
            address TEXT,
            UNIQUE(pair_code, dedupe_key)
        );

        CREATE TABLE IF NOT EXISTS mirror_photos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            photo_id TEXT NOT NULL UNIQUE,
            pair_code TEXT NOT NULL REFERENCES mirror_shifts(pair_code),
            dedupe_key TEXT NOT NULL,
            event_id TEXT,
            photo_ref TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            latitude REAL,
            longitude REAL,
            address TEXT,
            image BLOB,
            UNIQUE(pair_code, dedupe_key)
        );

        CREATE TABLE IF NOT EXISTS mirror_notes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pair_code TEXT NOT NULL REFERENCES mirror_shifts(pair_code),
            dedupe_key TEXT NOT NULL,
            event_id TEXT,
            text TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            latitude REAL,
            longitude REAL,
            UNIQUE(pair_code, dedupe_key)
        );

        CREATE INDEX IF NOT EXISTS idx_mirror_locations_pair ON mirror_locations(pair_code, timestamp);
        CREATE INDEX IF NOT EXISTS idx_mirror_photos_pair ON mirror_photos(pair_code, timestamp);
        CREATE INDEX IF NOT EXISTS idx_mirror_notes_pair ON mirror_notes(pair_code, timestamp);

        INSERT INTO schema_version (version) VALUES (1);",
    )?;
    tx.commit()?;

    tracing::info!("Migrated mirror database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();
        run(&mut conn).unwrap();
        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);
    }
}
