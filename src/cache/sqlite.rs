//! SQLite-backed [`Store`].

use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::{CacheKey, Store, StoreError};

/// Persistent store in a single SQLite file.
///
/// The schema is one table, `cache(key TEXT PRIMARY KEY, value BLOB)`, keyed
/// by the hex form of [`CacheKey`]. Entries never expire. The connection is
/// shared behind a mutex; SQLite itself serialises writers across processes.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    /// Opens (or creates) the cache database at `path`, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the directory or database cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache (
                key   TEXT PRIMARY KEY,
                value BLOB NOT NULL
            );",
        )?;

        debug!(path = %path.display(), "opened sqlite cache");
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    /// Path of the backing database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of cached entries.
    pub fn len(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM cache", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

impl Store for SqliteStore {
    fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, StoreError> {
        let value: Option<Vec<u8>> = self
            .conn
            .lock()
            .query_row(
                "SELECT value FROM cache WHERE key = ?1",
                params![key.to_hex()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.map(Bytes::from))
    }

    fn put(&self, key: &CacheKey, value: &[u8]) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO cache (key, value) VALUES (?1, ?2)",
            params![key.to_hex(), value],
        )?;
        Ok(())
    }
}
