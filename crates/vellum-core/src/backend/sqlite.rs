//! Transactional SQL backend on SQLite.
//!
//! A fresh connection per operation keeps the backend `Sync` without a pool;
//! SQLite's own locking serializes writers. `put_raw` runs find-then-update-or-insert
//! inside one `IMMEDIATE` transaction so two writers to the same key cannot both
//! observe it absent; `insert_raw` leans on the primary key instead.

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, TransactionBehavior};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{StoreError, StoreResult};
use crate::schema::{Column, TableSchema};
use crate::store::{Backend, RawSnapshot};

pub const KEY_VALUE_TABLE: TableSchema = TableSchema {
    name: "key_value",
    columns: &[
        Column::text("key").primary_key(),
        Column::blob("payload").not_null(),
    ],
    indexes: &[],
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteBackend {
    db_path: PathBuf,
}

impl SqliteBackend {
    /// Creates the database file and the `key_value` table if missing.
    pub fn create<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        KEY_VALUE_TABLE.create(&conn)?;
        tracing::info!(target: "vellum::store", path = %db_path.display(), "created sqlite database");
        Ok(Self { db_path })
    }

    /// Opens an existing database. Fails with `MissingDatabase` if the file is absent.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        if !db_path.is_file() {
            return Err(StoreError::MissingDatabase(db_path.display().to_string()));
        }
        let this = Self { db_path };
        // Surface a corrupt or foreign file now rather than on first use.
        KEY_VALUE_TABLE.create(&this.connect()?)?;
        Ok(this)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> StoreResult<Connection> {
        let conn = Connection::open_with_flags(&self.db_path, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }
}

impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn put_raw(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let exists = tx
            .query_row("SELECT 1 FROM key_value WHERE key = ?1", params![key], |_| Ok(()))
            .optional()?
            .is_some();
        if exists {
            tx.execute(
                "UPDATE key_value SET payload = ?2 WHERE key = ?1",
                params![key, value],
            )?;
        } else {
            tx.execute(
                "INSERT INTO key_value (key, payload) VALUES (?1, ?2)",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// A single statement; the primary key decides the race.
    fn insert_raw(&self, key: &str, value: &[u8]) -> StoreResult<bool> {
        let conn = self.connect()?;
        let inserted = conn.execute(
            "INSERT INTO key_value (key, payload) VALUES (?1, ?2) ON CONFLICT(key) DO NOTHING",
            params![key, value],
        )?;
        Ok(inserted == 1)
    }

    fn get_raw(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let conn = self.connect()?;
        let payload = conn
            .query_row(
                "SELECT payload FROM key_value WHERE key = ?1",
                params![key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn has(&self, key: &str) -> StoreResult<bool> {
        let conn = self.connect()?;
        let found = conn
            .query_row("SELECT 1 FROM key_value WHERE key = ?1", params![key], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn for_each_raw(&self, f: &mut dyn FnMut(&str, &[u8]) -> StoreResult<()>) -> StoreResult<()> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT key, payload FROM key_value")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let payload: Vec<u8> = row.get(1)?;
            f(&key, &payload)?;
        }
        Ok(())
    }

    /// Reads the whole table inside one read transaction, so concurrent writers
    /// cannot make a key appear twice or vanish mid-scan.
    fn snapshot_raw(&self) -> StoreResult<RawSnapshot> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let mut entries = BTreeMap::new();
        {
            let mut stmt = tx.prepare("SELECT key, payload FROM key_value")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?;
            for row in rows {
                let (k, v) = row?;
                entries.insert(k, v);
            }
        }
        tx.commit()?;
        Ok(RawSnapshot {
            entries,
            point_in_time: true,
        })
    }

    fn close(self) -> StoreResult<()> {
        tracing::debug!(target: "vellum::store", path = %self.db_path.display(), "sqlite backend released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.sqlite");
        assert!(matches!(
            SqliteBackend::open(&path),
            Err(StoreError::MissingDatabase(_))
        ));

        let backend = SqliteBackend::create(&path).unwrap();
        backend.put_raw("k", b"one").unwrap();
        backend.put_raw("k", b"two").unwrap();
        assert!(!backend.insert_raw("k", b"three").unwrap());
        backend.close().unwrap();

        let backend = SqliteBackend::open(&path).unwrap();
        assert_eq!(backend.get_raw("k").unwrap(), Some(b"two".to_vec()));
        let snap = backend.snapshot_raw().unwrap();
        assert!(snap.point_in_time);
        assert_eq!(snap.entries.len(), 1);
    }
}
