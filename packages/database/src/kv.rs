//! Keyed text storage.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use duckdb::Connection;

use crate::DbError;

/// A durable string-to-string store.
///
/// Values are opaque text; callers own the serialization format.
pub trait KvStore: Send + Sync {
    /// Reads a value. Returns `Ok(None)` if the key has never been set.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, DbError>;

    /// Writes a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), DbError>;

    /// Deletes a key. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backing storage cannot be modified.
    fn remove(&self, key: &str) -> Result<(), DbError>;
}

/// Stores keys in a single-table `DuckDB` file.
///
/// `duckdb::Connection` is not `Sync`, so the connection sits behind a
/// mutex; every operation is one short statement.
pub struct DuckDbKvStore {
    conn: Mutex<Connection>,
}

impl DuckDbKvStore {
    /// Opens (or creates) the store at `path`, creating parent directories
    /// and the `kv` table as needed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the directory, connection, or schema cannot
    /// be created.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir(parent)?;
        }
        let conn = Connection::open(path)?;
        create_schema(&conn)?;
        log::debug!("Opened key-value store at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a throwaway in-memory database with the same schema.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema cannot be created.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        create_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;
    Ok(())
}

impl KvStore for DuckDbKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?")?;
        match stmt.query_row([key], |row| row.get(0)) {
            Ok(value) => Ok(Some(value)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DbError::DuckDb(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.conn().execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
            duckdb::params![key, value],
        )?;
        log::debug!("Stored {} bytes under {key}", value.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DbError> {
        self.conn()
            .execute("DELETE FROM kv WHERE key = ?", duckdb::params![key])?;
        Ok(())
    }
}

/// In-memory store for tests and runs that should not touch disk.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKvStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with one entry.
    #[must_use]
    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        store
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        store
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, DbError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DbError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duckdb_store_round_trips_and_removes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = crate::paths::kv_db_path(&tmp.path().join("nested"));
        let store = DuckDbKvStore::open(&path).unwrap();

        assert_eq!(store.get("geocodeCache").unwrap(), None);
        store.set("geocodeCache", "[]").unwrap();
        assert_eq!(store.get("geocodeCache").unwrap().as_deref(), Some("[]"));

        store.set("geocodeCache", "[[\"a\",null]]").unwrap();
        assert_eq!(
            store.get("geocodeCache").unwrap().as_deref(),
            Some("[[\"a\",null]]")
        );

        store.remove("geocodeCache").unwrap();
        assert_eq!(store.get("geocodeCache").unwrap(), None);
        store.remove("geocodeCache").unwrap();
    }

    #[test]
    fn duckdb_store_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = crate::paths::kv_db_path(tmp.path());
        DuckDbKvStore::open(&path)
            .unwrap()
            .set("geocodeCache", "[[\"강원 강릉시\",null]]")
            .unwrap();

        let reopened = DuckDbKvStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("geocodeCache").unwrap().as_deref(),
            Some("[[\"강원 강릉시\",null]]")
        );
    }

    #[test]
    fn keys_are_plain_text() {
        let store = DuckDbKvStore::open_in_memory().unwrap();
        for key in ["../escape", "a/b", "with space", "'; DROP TABLE kv; --"] {
            store.set(key, key).unwrap();
            assert_eq!(store.get(key).unwrap().as_deref(), Some(key));
        }
    }

    #[test]
    fn memory_store_behaves_like_a_map() {
        let store = MemoryKvStore::with_entry("k", "v");
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.set("k", "w").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("w"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
