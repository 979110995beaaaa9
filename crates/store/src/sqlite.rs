use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{CapabilityRecord, HandleStore};

pub struct SqliteHandleStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteHandleStore {
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", &"WAL")?;
        conn.pragma_update(None, "synchronous", &"NORMAL")?;
        apply_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for SqliteHandleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteHandleStore")
            .field("path", &self.path)
            .finish()
    }
}

fn apply_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(include_str!("../migrations/V0001__handles.sql"))?;
    conn.execute(
        "INSERT OR IGNORE INTO migrations(name, applied_at) VALUES(?1, strftime('%s','now'))",
        params!["V0001__handles"],
    )?;
    Ok(())
}

fn is_missing_table(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.starts_with("no such table"),
        _ => false,
    }
}

impl HandleStore for SqliteHandleStore {
    fn put(&self, key: &str, record: &CapabilityRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        let now = chrono::Utc::now().timestamp();
        self.conn.lock().execute(
            "INSERT INTO handles(key, record_json, updated_at) VALUES(?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET record_json = excluded.record_json, updated_at = excluded.updated_at",
            params![key, json, now],
        )?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<CapabilityRecord>> {
        let conn = self.conn.lock();
        let mut stmt = match conn.prepare("SELECT record_json FROM handles WHERE key = ?1 LIMIT 1") {
            Ok(stmt) => stmt,
            Err(e) if is_missing_table(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            let raw: String = row.get(0)?;
            Ok(Some(serde_json::from_str(&raw)?))
        } else {
            Ok(None)
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self
            .conn
            .lock()
            .execute("DELETE FROM handles WHERE key = ?1", params![key])
        {
            Ok(_) => Ok(()),
            Err(e) if is_missing_table(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Folds the WAL into the main database file so the record survives a
    /// crash before the next automatic checkpoint.
    fn protect(&self) -> Result<()> {
        self.conn
            .lock()
            .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}
