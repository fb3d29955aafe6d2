//! Embedded backend on sled. Single process; sled serializes writers per key.

use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};
use crate::store::Backend;

/// Directory under the data dir holding the sled database.
pub const SLED_DIR: &str = "users";

pub struct SledBackend {
    db: ::sled::Db,
    path: PathBuf,
}

impl SledBackend {
    /// Creates the database under `<data_dir>/users` if missing, then opens it.
    pub fn create<P: AsRef<Path>>(data_dir: P) -> StoreResult<Self> {
        let path = data_dir.as_ref().join(SLED_DIR);
        std::fs::create_dir_all(&path)?;
        tracing::info!(target: "vellum::store", path = %path.display(), "creating sled database");
        Self::open_at(path)
    }

    /// Opens an existing database. Fails with `MissingDatabase` rather than
    /// creating an empty one.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> StoreResult<Self> {
        let path = data_dir.as_ref().join(SLED_DIR);
        if !path.is_dir() {
            return Err(StoreError::MissingDatabase(path.display().to_string()));
        }
        Self::open_at(path)
    }

    fn open_at(path: PathBuf) -> StoreResult<Self> {
        let db = ::sled::open(&path)?;
        tracing::debug!(target: "vellum::store", path = %path.display(), "sled database opened");
        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Backend for SledBackend {
    fn name(&self) -> &'static str {
        "sled"
    }

    fn put_raw(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.db.insert(key.as_bytes(), value)?;
        Ok(())
    }

    fn insert_raw(&self, key: &str, value: &[u8]) -> StoreResult<bool> {
        let swapped = self
            .db
            .compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(value))?;
        Ok(swapped.is_ok())
    }

    fn get_raw(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.db.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn has(&self, key: &str) -> StoreResult<bool> {
        Ok(self.db.contains_key(key.as_bytes())?)
    }

    fn for_each_raw(&self, f: &mut dyn FnMut(&str, &[u8]) -> StoreResult<()>) -> StoreResult<()> {
        for item in self.db.iter() {
            let (k, v) = item?;
            let key = String::from_utf8_lossy(&k);
            f(&key, &v)?;
        }
        Ok(())
    }

    fn close(self) -> StoreResult<()> {
        self.db.flush()?;
        tracing::debug!(target: "vellum::store", path = %self.path.display(), "sled database flushed");
        Ok(())
    }
}
