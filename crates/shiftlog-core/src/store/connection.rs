//! SQLite-backed record store

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{migrations, RecordKey};
use crate::error::{Error, Result};
use crate::util::now_millis;

/// How long a writer waits for another process holding the write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Crash-safe key-value store for the engine's records.
///
/// Calls are short synchronous SQLite operations serialized by a mutex; no
/// lock is ever held across an await point.
pub struct EventStore {
    conn: Mutex<Connection>,
}

impl EventStore {
    /// Open a store at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self::from_connection(conn)?;
        tracing::debug!(path = %path.display(), "Opened event store");
        Ok(store)
    }

    /// Open an in-memory store (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        configure(&conn)?;
        migrations::run(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Read the last fully-written value of a record.
    pub fn read<T: DeserializeOwned>(&self, key: RecordKey) -> Result<Option<T>> {
        let conn = self.lock()?;
        read_record(&conn, key)
    }

    /// Replace a record. Durable once this returns.
    pub fn write<T: Serialize>(&self, key: RecordKey, value: &T) -> Result<()> {
        self.transact(|txn| txn.write(key, value))
    }

    /// Remove a record; reading it afterwards yields `None`.
    pub fn delete(&self, key: RecordKey) -> Result<()> {
        self.transact(|txn| txn.delete(key))
    }

    /// Run several reads and writes as one atomic commit.
    ///
    /// If `apply` returns an error nothing it wrote becomes visible. The write
    /// lock is taken up front, so a record read inside `apply` cannot be
    /// changed by another process before `apply` writes it back.
    pub fn transact<R>(&self, apply: impl FnOnce(&mut StoreTxn<'_>) -> Result<R>) -> Result<R> {
        let mut conn = self.lock()?;
        let mut txn = StoreTxn {
            tx: conn.transaction_with_behavior(TransactionBehavior::Immediate)?,
        };
        let result = apply(&mut txn)?;
        txn.tx.commit().map_err(|error| {
            Error::persistence(format!("failed to commit store transaction: {error}"))
        })?;
        Ok(result)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::persistence("event store lock poisoned"))
    }
}

/// A store transaction handed to [`EventStore::transact`].
pub struct StoreTxn<'conn> {
    tx: Transaction<'conn>,
}

impl StoreTxn<'_> {
    pub fn read<T: DeserializeOwned>(&self, key: RecordKey) -> Result<Option<T>> {
        read_record(&self.tx, key)
    }

    pub fn write<T: Serialize>(&mut self, key: RecordKey, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.tx.execute(
            "INSERT INTO records (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key.as_str(), json, now_millis()],
        )?;
        Ok(())
    }

    pub fn delete(&mut self, key: RecordKey) -> Result<()> {
        self.tx
            .execute("DELETE FROM records WHERE key = ?1", params![key.as_str()])?;
        Ok(())
    }
}

fn read_record<T: DeserializeOwned>(conn: &Connection, key: RecordKey) -> Result<Option<T>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM records WHERE key = ?1",
            params![key.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    value
        .map(|json| serde_json::from_str(&json).map_err(Error::from))
        .transpose()
}

/// Configure `SQLite` so that a returned commit is on disk.
fn configure(conn: &Connection) -> Result<()> {
    // In-memory databases report "memory" here, which is fine.
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    tracing::debug!(journal_mode = %mode, "Configured event store");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn missing_record_reads_as_none() {
        let store = EventStore::open_in_memory().unwrap();
        let value: Option<Vec<String>> = store.read(RecordKey::SyncQueue).unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn write_then_read_returns_last_value() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .write(RecordKey::ShiftHistory, &vec!["a".to_string()])
            .unwrap();
        store
            .write(RecordKey::ShiftHistory, &vec!["b".to_string(), "c".to_string()])
            .unwrap();

        let value: Option<Vec<String>> = store.read(RecordKey::ShiftHistory).unwrap();
        assert_eq!(value, Some(vec!["b".to_string(), "c".to_string()]));
    }

    #[test]
    fn records_are_independent() {
        let store = EventStore::open_in_memory().unwrap();
        store.write(RecordKey::ActiveShift, &1_u32).unwrap();
        store.write(RecordKey::SyncQueue, &2_u32).unwrap();
        store.delete(RecordKey::ActiveShift).unwrap();

        assert_eq!(store.read::<u32>(RecordKey::ActiveShift).unwrap(), None);
        assert_eq!(store.read::<u32>(RecordKey::SyncQueue).unwrap(), Some(2));
    }

    #[test]
    fn failed_transaction_leaves_no_partial_write() {
        let store = EventStore::open_in_memory().unwrap();
        store.write(RecordKey::ActiveShift, &"before").unwrap();

        let result: Result<()> = store.transact(|txn| {
            txn.write(RecordKey::ActiveShift, &"after")?;
            txn.write(RecordKey::ShiftHistory, &vec!["moved"])?;
            Err(Error::validation("abort"))
        });

        assert!(result.is_err());
        assert_eq!(
            store.read::<String>(RecordKey::ActiveShift).unwrap(),
            Some("before".to_string())
        );
        assert_eq!(
            store.read::<Vec<String>>(RecordKey::ShiftHistory).unwrap(),
            None
        );
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("shiftlog.db");

        {
            let store = EventStore::open(&path).unwrap();
            store
                .write(RecordKey::SyncQueue, &vec![1_u32, 2, 3])
                .unwrap();
        }

        let reopened = EventStore::open(&path).unwrap();
        assert_eq!(
            reopened.read::<Vec<u32>>(RecordKey::SyncQueue).unwrap(),
            Some(vec![1, 2, 3])
        );
    }

    #[test]
    fn concurrent_stores_do_not_lose_updates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shiftlog.db");
        let stores = [
            EventStore::open(&path).unwrap(),
            EventStore::open(&path).unwrap(),
        ];

        std::thread::scope(|scope| {
            for store in &stores {
                scope.spawn(move || {
                    for _ in 0..20 {
                        store
                            .transact(|txn| {
                                let count: u32 = txn.read(RecordKey::SyncQueue)?.unwrap_or(0);
                                std::thread::sleep(Duration::from_millis(1));
                                txn.write(RecordKey::SyncQueue, &(count + 1))
                            })
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(stores[0].read::<u32>(RecordKey::SyncQueue).unwrap(), Some(40));
    }

    #[test]
    fn corrupt_record_surfaces_as_error() {
        let store = EventStore::open_in_memory().unwrap();
        store.write(RecordKey::SyncQueue, &"not a list").unwrap();
        assert!(store.read::<Vec<u32>>(RecordKey::SyncQueue).is_err());
    }
}
