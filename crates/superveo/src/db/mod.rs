//! Database module for persistent storage.
//!
//! Uses rusqlite (SQLite) with a thread-safe `Database` handle.
//! All access is serialized through a `Mutex<Connection>`.
//!
//! Application state is persisted as independently keyed JSON snapshots
//! (jobs, logs, settings) through the [`SnapshotStore`] trait, so hosts that
//! do not want a file on disk can swap in [`MemorySnapshotStore`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

pub mod error;
pub mod migrations;
pub mod snapshot_repo;

pub use error::DatabaseError;

/// Snapshot key for the job collection.
pub const JOBS_KEY: &str = "veo-jobs";
/// Snapshot key for the log collection.
pub const LOGS_KEY: &str = "veo-logs";
/// Snapshot key for the settings object.
pub const SETTINGS_KEY: &str = "veo-settings";

/// Key-value persistence for whole-collection snapshots.
pub trait SnapshotStore: Send + Sync {
    /// Reads the snapshot stored under `key`.
    fn load(&self, key: &str) -> Result<Option<String>, DatabaseError>;
    /// Replaces the snapshot stored under `key`.
    fn save(&self, key: &str, value: &str) -> Result<(), DatabaseError>;
    /// Removes the snapshot stored under `key`; missing keys are not an error.
    fn delete(&self, key: &str) -> Result<(), DatabaseError>;
}

/// Thread-safe database handle wrapping a single rusqlite connection.
///
/// Cloning is cheap (inner `Arc`). WAL mode is enabled for file databases.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database at the given path and runs all
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        migrations::run_all(&conn)?;

        log::info!("Database opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database for testing. Runs all migrations.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;

        migrations::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Provides locked access to the underlying connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

impl SnapshotStore for Database {
    fn load(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        snapshot_repo::find(self, key)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        snapshot_repo::upsert(self, key, value)
    }

    fn delete(&self, key: &str) -> Result<(), DatabaseError> {
        snapshot_repo::delete(self, key).map(|_| ())
    }
}

/// In-process snapshot store. Contents are lost when dropped.
#[derive(Default)]
pub struct MemorySnapshotStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a snapshot exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let entries = self.entries.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        let mut entries = self.entries.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), DatabaseError> {
        let mut entries = self.entries.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// Returns the canonical database path: `~/.superveo/data/superveo.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".superveo").join("data").join("superveo.db"))
}
