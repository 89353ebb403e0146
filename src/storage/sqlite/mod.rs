mod migrations;

use anyhow::{Context, Result};
use chrono::Utc;
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use std::{path::PathBuf, sync::Mutex};

use super::{lock, KeyValueStore};
use migrations::run_migrations;

/// Key-value blobs in a single SQLite table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let conn = Connection::open(&db_path).context("failed to open SQLite database")?;
        let store = Self::from_connection(conn, db_path)?;
        info!("Tour store initialized at {}", store.db_path.display());
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory SQLite")?;
        Self::from_connection(conn, PathBuf::from(":memory:"))
    }

    fn from_connection(mut conn: Connection, db_path: PathBuf) -> Result<Self> {
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            error!("Failed to enable WAL mode: {err}");
        }

        run_migrations(&mut conn).context("failed to run store migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = lock(&self.conn);
        conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()
        .with_context(|| format!("failed to read '{key}'"))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = lock(&self.conn);
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )
        .with_context(|| format!("failed to write '{key}'"))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = lock(&self.conn);
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])
            .with_context(|| format!("failed to delete '{key}'"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upserts_and_removes() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "one").unwrap();
        store.set("k", "two").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));

        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn reopening_keeps_data_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tour.sqlite3");

        let store = SqliteStore::new(path.clone()).unwrap();
        store.set("tour-state", "blob").unwrap();
        drop(store);

        let reopened = SqliteStore::new(path).unwrap();
        assert_eq!(reopened.get("tour-state").unwrap().as_deref(), Some("blob"));
    }
}
