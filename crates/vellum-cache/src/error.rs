use thiserror::Error;
use vellum_core::{ShutdownError, StoreError};

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache is shutting down")]
    Shutdown,

    /// The on-disk cache was written by another cache version.
    #[error("wrong cache version: expected {expected}, found {found}")]
    WrongVersion { expected: u32, found: u32 },

    #[error("record not found")]
    RecordNotFound,

    #[error("record {token} version {version} already exists")]
    RecordExists { token: String, version: String },

    /// `NewRecord` was given something other than the initial version, or
    /// `UpdateRecord` a version that does not follow the latest.
    #[error("invalid record version {found:?}: expected {expected}")]
    InvalidVersion { expected: String, found: String },

    #[error("invalid record status {0}")]
    InvalidStatus(i64),

    /// Status updates must target the latest version.
    #[error("version {version} of {token} is not the latest ({latest})")]
    StaleVersion {
        token: String,
        version: String,
        latest: String,
    },

    /// A previous `Build` did not complete; only a full rebuild clears this.
    #[error("cache build incomplete; a full rebuild is required")]
    NeedsRebuild,

    #[error("invalid plugin")]
    InvalidPlugin,

    #[error("duplicate plugin")]
    DuplicatePlugin,

    #[error("invalid plugin command")]
    InvalidPluginCmd,

    /// Plugin-level rejection (bad payload, unknown comment, setting violated).
    #[error("plugin: {0}")]
    Plugin(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound)
    }

    /// Plugin contract errors are configuration or caller mistakes.
    pub fn is_plugin_contract(&self) -> bool {
        matches!(
            self,
            Self::InvalidPlugin | Self::DuplicatePlugin | Self::InvalidPluginCmd
        )
    }
}

impl ShutdownError for CacheError {
    fn shutdown() -> Self {
        Self::Shutdown
    }
}
