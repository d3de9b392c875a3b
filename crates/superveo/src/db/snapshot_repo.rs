//! Snapshot repository: key/value rows in the `snapshots` table.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::{Database, DatabaseError};

/// Returns the stored value for `key`, if any.
pub fn find(db: &Database, key: &str) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let value = conn
            .query_row(
                "SELECT value FROM snapshots WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    })
}

/// Inserts or replaces the value stored under `key`.
pub fn upsert(db: &Database, key: &str, value: &str) -> Result<(), DatabaseError> {
    let now = Utc::now().to_rfc3339();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO snapshots (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    })
}

/// Deletes the row for `key`. Returns true if a row was removed.
pub fn delete(db: &Database, key: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute("DELETE FROM snapshots WHERE key = ?1", params![key])?;
        Ok(affected > 0)
    })
}

/// Lists every stored key, sorted.
pub fn keys(db: &Database) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT key FROM snapshots ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    })
}
