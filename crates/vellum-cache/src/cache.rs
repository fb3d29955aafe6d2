//! SQLite-backed record cache.
//!
//! Every `(token, version)` is kept forever in `records`; `latest` points at the
//! greatest version of each token and is moved in the same transaction that
//! inserts the version. `cache_meta` holds the cache's version marker and the
//! build flag that `Build` raises before wiping.

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, TransactionBehavior};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use vellum_core::codec::{self, VersionRecord};
use vellum_core::{Column, Lifecycle, TableSchema};

use crate::error::{CacheError, CacheResult};
use crate::plugin::{
    builtin_driver, Plugin, PluginCommand, PluginCommandReply, PluginDriver, PluginRegistry,
};
use crate::record::{
    version_ord, CensorshipRecord, InventoryStats, MetadataStream, Record, RecordStatus,
    INITIAL_VERSION,
};

/// On-disk layout version of the cache.
pub const CACHE_VERSION: u32 = 1;

const META_VERSION_KEY: &str = "version";
const META_BUILD_STATE_KEY: &str = "build_state";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const RECORDS_TABLE: TableSchema = TableSchema {
    name: "records",
    columns: &[
        Column::text("token").primary_key(),
        Column::text("version").primary_key(),
        Column::integer("status").not_null(),
        Column::integer("timestamp").not_null(),
        Column::text("merkle").not_null(),
        Column::text("signature").not_null(),
        Column::text("metadata").not_null(),
        Column::text("files").not_null(),
    ],
    indexes: &[],
};

const LATEST_TABLE: TableSchema = TableSchema {
    name: "latest",
    columns: &[
        Column::text("token").primary_key(),
        Column::text("version").not_null(),
    ],
    indexes: &[],
};

const META_TABLE: TableSchema = TableSchema {
    name: "cache_meta",
    columns: &[
        Column::text("key").primary_key(),
        Column::blob("value").not_null(),
    ],
    indexes: &[],
};

const RECORD_COLUMNS: &str =
    "r.token, r.version, r.status, r.timestamp, r.merkle, r.signature, r.metadata, r.files";

/// Whether the last `Build` completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Ready,
    Building,
}

impl BuildState {
    fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Ready => b"ready",
            Self::Building => b"building",
        }
    }
}

/// Read surface for read-path collaborators.
pub trait RecordReader: Send + Sync {
    /// Latest version of `token`.
    fn record(&self, token: &str) -> CacheResult<Record>;

    fn record_version(&self, token: &str, version: &str) -> CacheResult<Record>;

    /// Latest version of every token.
    fn inventory(&self) -> CacheResult<Vec<Record>>;

    /// Counts by status over latest versions, recomputed on every call.
    fn inventory_stats(&self) -> CacheResult<InventoryStats>;
}

/// Full surface used by the write path.
pub trait Cache: RecordReader {
    /// Inserts version [`INITIAL_VERSION`] of a new token.
    fn new_record(&self, record: &Record) -> CacheResult<()>;

    /// Inserts another version of an existing token and makes it the latest.
    /// The version must order above the current latest: an equal version is
    /// `RecordExists`, a lower one `InvalidVersion`.
    fn update_record(&self, record: &Record) -> CacheResult<()>;

    /// Sets status, timestamp and metadata of the latest version in place.
    fn update_record_status(
        &self,
        token: &str,
        version: &str,
        status: RecordStatus,
        timestamp: i64,
        metadata: &[MetadataStream],
    ) -> CacheResult<()>;

    /// Wipes and repopulates the cache. On failure the cache stays unusable
    /// (`NeedsRebuild`) until a later `build` succeeds.
    fn build(&self, records: &[Record]) -> CacheResult<()>;

    fn register_plugin(&self, plugin: Plugin) -> CacheResult<()>;

    fn plugin_setup(&self, id: &str) -> CacheResult<()>;

    fn plugin_build(&self, id: &str, payload: &str) -> CacheResult<()>;

    fn plugin_exec(&self, cmd: &PluginCommand) -> CacheResult<PluginCommandReply>;

    fn close(&self);
}

struct CacheDb {
    path: PathBuf,
}

impl CacheDb {
    fn connect(&self) -> CacheResult<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }
}

struct RecordRow {
    token: String,
    version: String,
    status: i64,
    timestamp: i64,
    merkle: String,
    signature: String,
    metadata: String,
    files: String,
}

impl RecordRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            token: row.get(0)?,
            version: row.get(1)?,
            status: row.get(2)?,
            timestamp: row.get(3)?,
            merkle: row.get(4)?,
            signature: row.get(5)?,
            metadata: row.get(6)?,
            files: row.get(7)?,
        })
    }

    fn into_record(self) -> CacheResult<Record> {
        Ok(Record {
            version: self.version,
            status: RecordStatus::try_from(self.status)?,
            timestamp: self.timestamp,
            censorship_record: CensorshipRecord {
                token: self.token,
                merkle: self.merkle,
                signature: self.signature,
            },
            metadata: serde_json::from_str(&self.metadata)?,
            files: serde_json::from_str(&self.files)?,
        })
    }
}

fn read_build_state(conn: &Connection) -> CacheResult<BuildState> {
    let value: Option<Vec<u8>> = conn
        .query_row(
            "SELECT value FROM cache_meta WHERE key = ?1",
            params![META_BUILD_STATE_KEY],
            |row| row.get(0),
        )
        .optional()?;
    Ok(match value.as_deref() {
        Some(b"building") => BuildState::Building,
        _ => BuildState::Ready,
    })
}

fn write_build_state(conn: &Connection, state: BuildState) -> CacheResult<()> {
    conn.execute(
        "INSERT INTO cache_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![META_BUILD_STATE_KEY, state.as_bytes()],
    )?;
    Ok(())
}

fn ensure_ready(conn: &Connection) -> CacheResult<()> {
    match read_build_state(conn)? {
        BuildState::Ready => Ok(()),
        BuildState::Building => Err(CacheError::NeedsRebuild),
    }
}

fn validate_status(status: RecordStatus) -> CacheResult<()> {
    if status.is_persistable() {
        Ok(())
    } else {
        Err(CacheError::InvalidStatus(status.code()))
    }
}

fn insert_version(conn: &Connection, record: &Record) -> CacheResult<()> {
    validate_status(record.status)?;
    let exists = conn
        .query_row(
            "SELECT 1 FROM records WHERE token = ?1 AND version = ?2",
            params![record.token(), record.version],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if exists {
        return Err(CacheError::RecordExists {
            token: record.token().to_string(),
            version: record.version.clone(),
        });
    }
    conn.execute(
        "INSERT INTO records (token, version, status, timestamp, merkle, signature, metadata, files)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.token(),
            record.version,
            record.status.code(),
            record.timestamp,
            record.censorship_record.merkle,
            record.censorship_record.signature,
            serde_json::to_string(&record.metadata)?,
            serde_json::to_string(&record.files)?,
        ],
    )?;
    Ok(())
}

fn set_latest(conn: &Connection, token: &str, version: &str) -> CacheResult<()> {
    conn.execute(
        "INSERT INTO latest (token, version) VALUES (?1, ?2)
         ON CONFLICT(token) DO UPDATE SET version = excluded.version",
        params![token, version],
    )?;
    Ok(())
}

fn latest_version(conn: &Connection, token: &str) -> CacheResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT version FROM latest WHERE token = ?1",
            params![token],
            |row| row.get(0),
        )
        .optional()?)
}

/// Record cache in one SQLite file, plus the plugins registered against it.
pub struct SqliteCache {
    db: Lifecycle<CacheDb>,
    plugins: PluginRegistry,
}

impl SqliteCache {
    /// Opens (creating if needed) the cache at `path` and checks its version marker.
    pub fn open<P: AsRef<Path>>(path: P) -> CacheResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = CacheDb { path };
        let mut conn = db.connect()?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        RECORDS_TABLE.create(&tx)?;
        LATEST_TABLE.create(&tx)?;
        META_TABLE.create(&tx)?;
        Self::ensure_marker(&tx)?;
        tx.commit()?;

        let state = read_build_state(&conn)?;
        tracing::info!(
            target: "vellum::cache",
            path = %db.path.display(),
            build_state = ?state,
            "cache opened"
        );
        Ok(Self {
            db: Lifecycle::new(db),
            plugins: PluginRegistry::new(),
        })
    }

    fn ensure_marker(conn: &Connection) -> CacheResult<()> {
        let stored: Option<Vec<u8>> = conn
            .query_row(
                "SELECT value FROM cache_meta WHERE key = ?1",
                params![META_VERSION_KEY],
                |row| row.get(0),
            )
            .optional()?;
        match stored {
            None => {
                let marker = VersionRecord {
                    version: CACHE_VERSION,
                    time: chrono::Utc::now().timestamp(),
                };
                conn.execute(
                    "INSERT INTO cache_meta (key, value) VALUES (?1, ?2)",
                    params![META_VERSION_KEY, codec::encode(&marker)?],
                )?;
                write_build_state(conn, BuildState::Ready)?;
                tracing::info!(target: "vellum::cache", version = CACHE_VERSION, "cache version marker written");
                Ok(())
            }
            Some(bytes) => {
                let marker: VersionRecord = codec::decode(&bytes)?;
                if marker.version != CACHE_VERSION {
                    tracing::error!(
                        target: "vellum::cache",
                        expected = CACHE_VERSION,
                        found = marker.version,
                        "cache version mismatch"
                    );
                    return Err(CacheError::WrongVersion {
                        expected: CACHE_VERSION,
                        found: marker.version,
                    });
                }
                Ok(())
            }
        }
    }

    pub fn build_state(&self) -> CacheResult<BuildState> {
        self.db.with(|db| read_build_state(&db.connect()?))
    }

    /// Registers a plugin with a caller-supplied driver instead of a built-in one.
    pub fn register_plugin_driver(
        &self,
        plugin: Plugin,
        driver: Arc<dyn PluginDriver>,
    ) -> CacheResult<()> {
        self.db.with(|_| self.plugins.register(plugin, driver))
    }

    pub fn plugin_ids(&self) -> Vec<String> {
        self.plugins.ids()
    }

    /// Runs `f` inside one IMMEDIATE transaction and commits if it succeeds.
    fn write<R>(&self, f: impl FnOnce(&Connection) -> CacheResult<R>) -> CacheResult<R> {
        self.db.with(|db| {
            let mut conn = db.connect()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let out = f(&tx)?;
            tx.commit()?;
            Ok(out)
        })
    }

    /// Runs a read against a ready cache inside one read transaction.
    fn read<R>(&self, f: impl FnOnce(&Connection) -> CacheResult<R>) -> CacheResult<R> {
        self.db.with(|db| {
            let mut conn = db.connect()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
            ensure_ready(&tx)?;
            let out = f(&tx)?;
            tx.commit()?;
            Ok(out)
        })
    }

    fn with_plugin_tx<R>(
        &self,
        id: &str,
        f: impl FnOnce(&dyn PluginDriver, &rusqlite::Transaction<'_>) -> CacheResult<R>,
    ) -> CacheResult<R> {
        self.db.with(|db| {
            let registered = self.plugins.get(id)?;
            let mut conn = db.connect()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let out = f(registered.driver.as_ref(), &tx)?;
            tx.commit()?;
            Ok(out)
        })
    }
}

impl RecordReader for SqliteCache {
    fn record(&self, token: &str) -> CacheResult<Record> {
        self.read(|conn| {
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM latest l
                 JOIN records r ON r.token = l.token AND r.version = l.version
                 WHERE l.token = ?1"
            );
            conn.query_row(&sql, params![token], RecordRow::from_row)
                .optional()?
                .ok_or(CacheError::RecordNotFound)?
                .into_record()
        })
    }

    fn record_version(&self, token: &str, version: &str) -> CacheResult<Record> {
        self.read(|conn| {
            let sql = format!("SELECT {RECORD_COLUMNS} FROM records r WHERE r.token = ?1 AND r.version = ?2");
            conn.query_row(&sql, params![token, version], RecordRow::from_row)
                .optional()?
                .ok_or(CacheError::RecordNotFound)?
                .into_record()
        })
    }

    fn inventory(&self) -> CacheResult<Vec<Record>> {
        self.read(|conn| {
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM latest l
                 JOIN records r ON r.token = l.token AND r.version = l.version
                 ORDER BY r.token"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], RecordRow::from_row)?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?.into_record()?);
            }
            Ok(records)
        })
    }

    fn inventory_stats(&self) -> CacheResult<InventoryStats> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.status, COUNT(*) FROM latest l
                 JOIN records r ON r.token = l.token AND r.version = l.version
                 GROUP BY r.status",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
            let mut stats = InventoryStats::default();
            for row in rows {
                let (status, count) = row?;
                stats.add(RecordStatus::try_from(status)?, count as u64)?;
            }
            Ok(stats)
        })
    }
}

impl Cache for SqliteCache {
    fn new_record(&self, record: &Record) -> CacheResult<()> {
        if record.version != INITIAL_VERSION {
            return Err(CacheError::InvalidVersion {
                expected: format!("{INITIAL_VERSION:?}"),
                found: record.version.clone(),
            });
        }
        self.write(|conn| {
            ensure_ready(conn)?;
            insert_version(conn, record)?;
            set_latest(conn, record.token(), &record.version)
        })?;
        tracing::debug!(target: "vellum::cache", token = record.token(), "record created");
        Ok(())
    }

    fn update_record(&self, record: &Record) -> CacheResult<()> {
        self.write(|conn| {
            ensure_ready(conn)?;
            let current = latest_version(conn, record.token())?.ok_or(CacheError::RecordNotFound)?;
            if version_ord(&record.version, &current) == Ordering::Less {
                return Err(CacheError::InvalidVersion {
                    expected: format!("a version above {current:?}"),
                    found: record.version.clone(),
                });
            }
            insert_version(conn, record)?;
            set_latest(conn, record.token(), &record.version)
        })?;
        tracing::debug!(
            target: "vellum::cache",
            token = record.token(),
            version = %record.version,
            "record version added"
        );
        Ok(())
    }

    fn update_record_status(
        &self,
        token: &str,
        version: &str,
        status: RecordStatus,
        timestamp: i64,
        metadata: &[MetadataStream],
    ) -> CacheResult<()> {
        validate_status(status)?;
        self.write(|conn| {
            ensure_ready(conn)?;
            let latest = latest_version(conn, token)?.ok_or(CacheError::RecordNotFound)?;
            if latest != version {
                let known = conn
                    .query_row(
                        "SELECT 1 FROM records WHERE token = ?1 AND version = ?2",
                        params![token, version],
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some();
                return Err(if known {
                    CacheError::StaleVersion {
                        token: token.to_string(),
                        version: version.to_string(),
                        latest,
                    }
                } else {
                    CacheError::RecordNotFound
                });
            }
            conn.execute(
                "UPDATE records SET status = ?3, timestamp = ?4, metadata = ?5
                 WHERE token = ?1 AND version = ?2",
                params![token, version, status.code(), timestamp, serde_json::to_string(metadata)?],
            )?;
            Ok(())
        })?;
        tracing::debug!(target: "vellum::cache", token = token, status = ?status, "record status updated");
        Ok(())
    }

    fn build(&self, records: &[Record]) -> CacheResult<()> {
        self.db.with(|db| {
            let mut conn = db.connect()?;

            // Raise the flag in its own transaction so a crash mid-build is visible.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            write_build_state(&tx, BuildState::Building)?;
            tx.commit()?;
            tracing::info!(target: "vellum::cache", records = records.len(), "cache build started");

            let result = (|| -> CacheResult<usize> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                tx.execute("DELETE FROM records", [])?;
                tx.execute("DELETE FROM latest", [])?;
                let mut latest: HashMap<&str, &str> = HashMap::new();
                for record in records {
                    insert_version(&tx, record)?;
                    let slot = latest.entry(record.token()).or_insert(record.version.as_str());
                    if version_ord(&record.version, *slot) == Ordering::Greater {
                        *slot = record.version.as_str();
                    }
                }
                for (token, version) in &latest {
                    set_latest(&tx, token, version)?;
                }
                write_build_state(&tx, BuildState::Ready)?;
                tx.commit()?;
                Ok(latest.len())
            })();

            match result {
                Ok(tokens) => {
                    tracing::info!(target: "vellum::cache", tokens = tokens, "cache build complete");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(target: "vellum::cache", error = %e, "cache build failed; rebuild required");
                    Err(e)
                }
            }
        })
    }

    fn register_plugin(&self, plugin: Plugin) -> CacheResult<()> {
        let driver = builtin_driver(&plugin)?;
        self.register_plugin_driver(plugin, driver)
    }

    fn plugin_setup(&self, id: &str) -> CacheResult<()> {
        self.with_plugin_tx(id, |driver, tx| driver.setup(tx))?;
        tracing::info!(target: "vellum::plugin", plugin_id = id, "plugin setup complete");
        Ok(())
    }

    fn plugin_build(&self, id: &str, payload: &str) -> CacheResult<()> {
        self.with_plugin_tx(id, |driver, tx| driver.build(tx, payload))
    }

    fn plugin_exec(&self, cmd: &PluginCommand) -> CacheResult<PluginCommandReply> {
        tracing::trace!(target: "vellum::plugin", plugin_id = %cmd.id, command = %cmd.command, "plugin exec");
        let payload = self.with_plugin_tx(&cmd.id, |driver, tx| {
            driver.exec(tx, &cmd.command, &cmd.command_payload, &cmd.reply_payload)
        })?;
        Ok(PluginCommandReply {
            id: cmd.id.clone(),
            command: cmd.command.clone(),
            payload,
        })
    }

    fn close(&self) {
        if self.db.close().is_some() {
            tracing::info!(target: "vellum::cache", "cache closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(token: &str, version: &str, status: RecordStatus) -> Record {
        Record {
            version: version.to_string(),
            status,
            timestamp: 1,
            censorship_record: CensorshipRecord {
                token: token.to_string(),
                merkle: format!("m-{version}"),
                signature: "sig".into(),
            },
            metadata: vec![],
            files: vec![],
        }
    }

    #[test]
    fn new_record_rules() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SqliteCache::open(dir.path().join("cache.sqlite")).unwrap();
        assert!(matches!(
            cache.new_record(&record("abc", "2", RecordStatus::NotReviewed)),
            Err(CacheError::InvalidVersion { .. })
        ));
        cache.new_record(&record("abc", "1", RecordStatus::NotReviewed)).unwrap();
        assert!(matches!(
            cache.new_record(&record("abc", "1", RecordStatus::NotReviewed)),
            Err(CacheError::RecordExists { .. })
        ));
        assert!(matches!(
            cache.new_record(&record("xyz", "1", RecordStatus::NotFound)),
            Err(CacheError::InvalidStatus(1))
        ));
    }

    #[test]
    fn status_update_targets_latest_only() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SqliteCache::open(dir.path().join("cache.sqlite")).unwrap();
        cache.new_record(&record("abc", "1", RecordStatus::NotReviewed)).unwrap();
        cache.update_record(&record("abc", "2", RecordStatus::NotReviewed)).unwrap();

        let err = cache
            .update_record_status("abc", "1", RecordStatus::Public, 5, &[])
            .unwrap_err();
        assert!(matches!(err, CacheError::StaleVersion { ref latest, .. } if latest == "2"));
        assert!(matches!(
            cache.update_record_status("abc", "7", RecordStatus::Public, 5, &[]),
            Err(CacheError::RecordNotFound)
        ));
        assert!(matches!(
            cache.update_record_status("nope", "1", RecordStatus::Public, 5, &[]),
            Err(CacheError::RecordNotFound)
        ));

        let md = [MetadataStream { id: 12, payload: "{}".into() }];
        cache.update_record_status("abc", "2", RecordStatus::Public, 5, &md).unwrap();
        // Idempotent.
        cache.update_record_status("abc", "2", RecordStatus::Public, 5, &md).unwrap();
        let latest = cache.record("abc").unwrap();
        assert_eq!(latest.status, RecordStatus::Public);
        assert_eq!(latest.metadata, md);
        assert_eq!(cache.record_version("abc", "1").unwrap().status, RecordStatus::NotReviewed);
    }

    #[test]
    fn numeric_versions_order_past_nine() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SqliteCache::open(dir.path().join("cache.sqlite")).unwrap();
        cache.new_record(&record("t", "1", RecordStatus::NotReviewed)).unwrap();
        for v in 2..=10 {
            cache.update_record(&record("t", &v.to_string(), RecordStatus::NotReviewed)).unwrap();
        }
        assert_eq!(cache.record("t").unwrap().version, "10");
    }

    #[test]
    fn update_rejects_versions_below_latest() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SqliteCache::open(dir.path().join("cache.sqlite")).unwrap();
        cache.new_record(&record("t", "1", RecordStatus::NotReviewed)).unwrap();
        cache.update_record(&record("t", "3", RecordStatus::NotReviewed)).unwrap();

        let err = cache
            .update_record(&record("t", "2", RecordStatus::NotReviewed))
            .unwrap_err();
        assert!(matches!(err, CacheError::InvalidVersion { ref found, .. } if found == "2"));
        assert!(matches!(
            cache.update_record(&record("t", "3", RecordStatus::NotReviewed)),
            Err(CacheError::RecordExists { .. })
        ));
        assert_eq!(cache.record("t").unwrap().version, "3");
        assert!(matches!(cache.record_version("t", "2"), Err(CacheError::RecordNotFound)));
    }

    #[test]
    fn foreign_cache_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite");
        SqliteCache::open(&path).unwrap();

        let conn = Connection::open(&path).unwrap();
        let stale = codec::encode(&VersionRecord { version: CACHE_VERSION + 1, time: 0 }).unwrap();
        conn.execute(
            "UPDATE cache_meta SET value = ?1 WHERE key = ?2",
            params![stale, META_VERSION_KEY],
        )
        .unwrap();
        drop(conn);

        assert!(matches!(
            SqliteCache::open(&path),
            Err(CacheError::WrongVersion { found, .. }) if found == CACHE_VERSION + 1
        ));
    }
}
