//! Store configuration: defaults, then an optional config file, then `VELLUM__*`
//! environment variables.

use serde::Deserialize;
use std::path::PathBuf;

use crate::backend::{BackendKind, SledBackend, SqliteBackend};
use crate::crypto::{
    load_encryption_key, resolve_encryption_key, DEFAULT_ENCRYPTION_KEY_FILENAME,
};
use crate::error::StoreResult;
use crate::store::{EncryptedStore, KeyValueStore};

/// Env var naming the config file (without extension). Default `config/vellum`.
pub const CONFIG_PATH_ENV: &str = "VELLUM_CONFIG";

/// SQLite database file name under the data dir.
pub const SQLITE_FILE: &str = "users.sqlite";

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub data_dir: String,
    #[serde(default)]
    pub backend: BackendKind,
    /// Defaults to `<data_dir>/dbencryptionkey.json`.
    #[serde(default)]
    pub encryption_key_path: Option<String>,
    /// Defaults to `<data_dir>/cache.sqlite`.
    #[serde(default)]
    pub cache_path: Option<String>,
    /// Defaults to `<data_dir>/backups`.
    #[serde(default)]
    pub backup_dir: Option<String>,
}

impl StoreConfig {
    /// Load config from file and environment. Precedence: env `VELLUM__*` > file named
    /// by `VELLUM_CONFIG` (default `config/vellum`) > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config/vellum".to_string());
        Self::load_from(&config_path)
    }

    /// Like [`load`](Self::load) with an explicit config file name.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("data_dir", "./data")?
            .set_default("backend", "sled")?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("VELLUM").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Config rooted at `data_dir` with everything else defaulted.
    pub fn with_data_dir(data_dir: impl Into<String>, backend: BackendKind) -> Self {
        Self {
            data_dir: data_dir.into(),
            backend,
            encryption_key_path: None,
            cache_path: None,
            backup_dir: None,
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn encryption_key_path(&self) -> PathBuf {
        self.encryption_key_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.data_dir().join(DEFAULT_ENCRYPTION_KEY_FILENAME))
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.data_dir().join("cache.sqlite"))
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.data_dir().join("backups"))
    }

    fn sqlite_path(&self) -> PathBuf {
        self.data_dir().join(SQLITE_FILE)
    }
}

/// First-run setup: generates the key file if absent, creates the configured
/// database and bootstraps its version marker.
pub fn create_store(cfg: &StoreConfig) -> StoreResult<Box<dyn KeyValueStore>> {
    let key = resolve_encryption_key(&cfg.encryption_key_path())?;
    tracing::info!(target: "vellum::store", backend = %cfg.backend, data_dir = %cfg.data_dir, "creating store");
    let store: Box<dyn KeyValueStore> = match cfg.backend {
        BackendKind::Sled => Box::new(EncryptedStore::open(SledBackend::create(cfg.data_dir())?, &key)?),
        BackendKind::Sqlite => {
            Box::new(EncryptedStore::open(SqliteBackend::create(cfg.sqlite_path())?, &key)?)
        }
    };
    Ok(store)
}

/// Opens the configured, already-created store. The key file must exist.
pub fn open_store(cfg: &StoreConfig) -> StoreResult<Box<dyn KeyValueStore>> {
    let key = load_encryption_key(&cfg.encryption_key_path())?;
    tracing::info!(target: "vellum::store", backend = %cfg.backend, data_dir = %cfg.data_dir, "opening store");
    let store: Box<dyn KeyValueStore> = match cfg.backend {
        BackendKind::Sled => Box::new(EncryptedStore::open(SledBackend::open(cfg.data_dir())?, &key)?),
        BackendKind::Sqlite => Box::new(EncryptedStore::open(SqliteBackend::open(cfg.sqlite_path())?, &key)?),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("vellum.toml");
        std::fs::write(
            &file,
            "data_dir = \"/srv/vellum\"\nbackend = \"sqlite\"\ncache_path = \"/tmp/c.sqlite\"\n",
        )
        .unwrap();
        let stem = dir.path().join("vellum");
        let cfg = StoreConfig::load_from(stem.to_str().unwrap()).unwrap();
        assert_eq!(cfg.backend, BackendKind::Sqlite);
        assert_eq!(cfg.data_dir(), PathBuf::from("/srv/vellum"));
        assert_eq!(cfg.cache_path(), PathBuf::from("/tmp/c.sqlite"));
        assert_eq!(
            cfg.encryption_key_path(),
            PathBuf::from("/srv/vellum").join(DEFAULT_ENCRYPTION_KEY_FILENAME)
        );
    }

    #[test]
    fn open_before_create_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = StoreConfig::with_data_dir(dir.path().to_string_lossy(), BackendKind::Sled);
        assert!(matches!(
            open_store(&cfg),
            Err(StoreError::LoadingEncryptionKey { .. })
        ));

        let store = create_store(&cfg).unwrap();
        store.put("k", b"v").unwrap();
        store.close().unwrap();

        let store = open_store(&cfg).unwrap();
        assert_eq!(store.get("k").unwrap(), b"v");
        store.close().unwrap();
    }
}
