//! Backend-agnostic encrypted key-value store.
//!
//! A [`Backend`] moves raw bytes; [`EncryptedStore`] layers the lifecycle guard,
//! AES-256-GCM sealing and the version bootstrap on top of any backend and
//! exposes the [`KeyValueStore`] contract.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::bootstrap::{Bootstrapped, Bootstrapper};
use crate::codec::{VersionRecord, SCHEMA_VERSION, VERSION_KEY};
use crate::crypto::{EncryptionContext, EncryptionKey};
use crate::error::{StoreError, StoreResult};
use crate::lifecycle::Lifecycle;

/// Raw, still-sealed copy of a keyspace.
#[derive(Debug, Default)]
pub struct RawSnapshot {
    pub entries: BTreeMap<String, Vec<u8>>,
    /// True when the backend read every entry from one point in time.
    pub point_in_time: bool,
}

/// Storage engine underneath an [`EncryptedStore`]. Values are opaque sealed bytes.
///
/// `put_raw` must replace atomically with respect to concurrent `put_raw`/`get_raw`
/// on the same key.
pub trait Backend: Send + Sync {
    /// Short engine name for logs and snapshots (e.g. "sled").
    fn name(&self) -> &'static str;

    fn put_raw(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Writes `value` only if `key` is absent, in one atomic step. Returns
    /// `false` and leaves the stored value untouched when the key exists.
    fn insert_raw(&self, key: &str, value: &[u8]) -> StoreResult<bool>;

    fn get_raw(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    fn has(&self, key: &str) -> StoreResult<bool>;

    /// Visits every entry; order is engine-defined.
    fn for_each_raw(&self, f: &mut dyn FnMut(&str, &[u8]) -> StoreResult<()>) -> StoreResult<()>;

    /// Copies the whole keyspace. Engines without native point-in-time reads
    /// fall back to `for_each_raw` and report `point_in_time = false`.
    fn snapshot_raw(&self) -> StoreResult<RawSnapshot> {
        let mut entries = BTreeMap::new();
        self.for_each_raw(&mut |k, v| {
            entries.insert(k.to_string(), v.to_vec());
            Ok(())
        })?;
        Ok(RawSnapshot {
            entries,
            point_in_time: false,
        })
    }

    /// Flushes and releases the engine handle.
    fn close(self) -> StoreResult<()>
    where
        Self: Sized;
}

/// Point-in-time (or best-effort) decrypted copy of the store for export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    /// Unix time (seconds) the snapshot was taken.
    pub time: i64,
    /// Schema version of the store.
    pub version: u32,
    pub backend: String,
    /// False for the weaker iteration-based snapshot (see [`Backend::snapshot_raw`]).
    pub point_in_time: bool,
    /// Decrypted payloads by key. The version marker is carried in `version`, not here.
    pub entries: BTreeMap<String, Vec<u8>>,
}

/// The store contract shared by every backend.
///
/// All operations return `StoreError::Shutdown` after [`close`](Self::close).
/// Writes to the version marker key fail with `StoreError::ReservedKey`.
pub trait KeyValueStore: Send + Sync {
    /// Seals `payload` and writes it under `key`, replacing any previous value.
    fn put(&self, key: &str, payload: &[u8]) -> StoreResult<()>;

    /// Like [`put`](Self::put) but only for an absent key. Concurrent callers on
    /// the same key see exactly one success; the rest get `StoreError::AlreadyExists`.
    fn put_new(&self, key: &str, payload: &[u8]) -> StoreResult<()>;

    /// Reads and opens the value at `key`. `StoreError::NotFound` if absent.
    fn get(&self, key: &str) -> StoreResult<Vec<u8>>;

    /// Existence check without decrypting.
    fn has(&self, key: &str) -> StoreResult<bool>;

    /// Calls `callback(key, plaintext)` for every stored entry except the
    /// version marker. No ordering guarantee.
    fn get_all(&self, callback: &mut dyn FnMut(&str, &[u8])) -> StoreResult<()>;

    /// Decrypted copy of the keyspace plus store metadata.
    fn snapshot(&self) -> StoreResult<Snapshot>;

    /// The version marker validated (or written) at open.
    fn version(&self) -> VersionRecord;

    /// Releases the backend. Later calls fail with `StoreError::Shutdown`.
    fn close(&self) -> StoreResult<()>;
}

// Only the bootstrap writes the marker, through `Backend::put_raw`.
fn reject_reserved(key: &str) -> StoreResult<()> {
    if key == VERSION_KEY {
        return Err(StoreError::ReservedKey(key.to_string()));
    }
    Ok(())
}

/// [`KeyValueStore`] over any [`Backend`].
pub struct EncryptedStore<B: Backend> {
    backend: Lifecycle<B>,
    crypto: EncryptionContext,
    marker: VersionRecord,
    backend_name: &'static str,
}

impl<B: Backend> EncryptedStore<B> {
    /// Opens the store: runs the bootstrap against `backend` and fails fast if the
    /// marker cannot be trusted. On failure the backend is released.
    pub fn open(backend: B, key: &EncryptionKey) -> StoreResult<Self> {
        let crypto = EncryptionContext::new(key);
        let booted = match Bootstrapper::new().run(&backend, &crypto) {
            Ok(b) => b,
            Err(e) => {
                if let Err(close_err) = backend.close() {
                    tracing::warn!(
                        target: "vellum::store",
                        error = %close_err,
                        "backend close after failed bootstrap"
                    );
                }
                return Err(e);
            }
        };
        let Bootstrapped { marker, .. } = booted;
        let backend_name = backend.name();
        Ok(Self {
            backend: Lifecycle::new(backend),
            crypto,
            marker,
            backend_name,
        })
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    pub fn is_closed(&self) -> bool {
        self.backend.is_closed()
    }
}

impl<B: Backend> KeyValueStore for EncryptedStore<B> {
    fn put(&self, key: &str, payload: &[u8]) -> StoreResult<()> {
        tracing::trace!(target: "vellum::store", key = key, "put");
        self.backend.with(|b| {
            reject_reserved(key)?;
            let sealed = self.crypto.seal(SCHEMA_VERSION, payload)?;
            b.put_raw(key, &sealed)
        })
    }

    fn put_new(&self, key: &str, payload: &[u8]) -> StoreResult<()> {
        tracing::trace!(target: "vellum::store", key = key, "put_new");
        self.backend.with(|b| {
            reject_reserved(key)?;
            let sealed = self.crypto.seal(SCHEMA_VERSION, payload)?;
            if b.insert_raw(key, &sealed)? {
                Ok(())
            } else {
                Err(StoreError::AlreadyExists)
            }
        })
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        tracing::trace!(target: "vellum::store", key = key, "get");
        self.backend.with(|b| {
            let sealed = b.get_raw(key)?.ok_or(StoreError::NotFound)?;
            let (plain, _) = self.crypto.open(&sealed)?;
            Ok(plain)
        })
    }

    fn has(&self, key: &str) -> StoreResult<bool> {
        tracing::trace!(target: "vellum::store", key = key, "has");
        self.backend.with(|b| b.has(key))
    }

    fn get_all(&self, callback: &mut dyn FnMut(&str, &[u8])) -> StoreResult<()> {
        tracing::trace!(target: "vellum::store", "get_all");
        self.backend.with(|b| {
            b.for_each_raw(&mut |key, sealed| {
                if key == VERSION_KEY {
                    return Ok(());
                }
                let (plain, _) = self.crypto.open(sealed)?;
                callback(key, &plain);
                Ok(())
            })
        })
    }

    fn snapshot(&self) -> StoreResult<Snapshot> {
        self.backend.with(|b| {
            let raw = b.snapshot_raw()?;
            let mut entries = BTreeMap::new();
            for (key, sealed) in raw.entries {
                if key == VERSION_KEY {
                    continue;
                }
                let (plain, _) = self.crypto.open(&sealed)?;
                entries.insert(key, plain);
            }
            let snapshot = Snapshot {
                id: Uuid::new_v4(),
                time: chrono::Utc::now().timestamp(),
                version: self.marker.version,
                backend: self.backend_name.to_string(),
                point_in_time: raw.point_in_time,
                entries,
            };
            tracing::info!(
                target: "vellum::store",
                backend = self.backend_name,
                entries = snapshot.entries.len(),
                point_in_time = snapshot.point_in_time,
                "snapshot taken"
            );
            Ok(snapshot)
        })
    }

    fn version(&self) -> VersionRecord {
        self.marker
    }

    fn close(&self) -> StoreResult<()> {
        match self.backend.close() {
            Some(backend) => {
                tracing::info!(target: "vellum::store", backend = self.backend_name, "closing store");
                backend.close()
            }
            None => Ok(()),
        }
    }
}
