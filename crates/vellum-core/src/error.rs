//! Error taxonomy for the encrypted key-value store.

use crate::crypto::CryptoError;
use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by the key-value store, its codec and its backends.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The key is absent from the store.
    #[error("key not found")]
    NotFound,

    /// The store was closed; the caller must open a fresh instance.
    #[error("database is shutting down")]
    Shutdown,

    /// The version marker (or a sealed envelope) carries another schema version.
    #[error("wrong database version: expected {expected}, found {found}")]
    WrongVersion { expected: u32, found: u32 },

    /// A decoded payload was written with another record version.
    #[error("wrong record version: expected {expected}, found {found}")]
    WrongRecordVersion { expected: u32, found: u32 },

    /// A decoded payload carries another record-kind tag.
    #[error("wrong record type: expected {expected}, found {found}")]
    WrongRecordType { expected: u32, found: u32 },

    /// The version marker could not be opened with the configured key.
    #[error("wrong encryption key")]
    WrongEncryptionKey,

    /// The key file is missing or malformed.
    #[error("encryption key could not be loaded from {path}: {reason}")]
    LoadingEncryptionKey { path: String, reason: String },

    /// The on-disk database does not exist; run `create` first.
    #[error("database does not exist: {0}")]
    MissingDatabase(String),

    /// `put_new` found the key already present.
    #[error("key already exists")]
    AlreadyExists,

    /// The key is owned by the store itself (the version marker).
    #[error("key {0:?} is reserved")]
    ReservedKey(String),

    /// A user with this email already exists.
    #[error("user already exists")]
    UserExists,

    /// Sealing or opening a payload failed.
    #[error("crypto: {0}")]
    Crypto(#[from] CryptoError),

    #[error("sled: {0}")]
    Sled(#[from] sled::Error),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(#[from] config::ConfigError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// True for integrity and version failures. These are terminal for the
    /// store instance; no migration or key recovery is attempted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::WrongVersion { .. }
                | Self::WrongRecordVersion { .. }
                | Self::WrongRecordType { .. }
                | Self::WrongEncryptionKey
                | Self::LoadingEncryptionKey { .. }
        )
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(StoreError::WrongEncryptionKey.is_fatal());
        assert!(StoreError::WrongVersion { expected: 1, found: 2 }.is_fatal());
        assert!(!StoreError::NotFound.is_fatal());
        assert!(!StoreError::Shutdown.is_fatal());
        assert!(StoreError::NotFound.is_not_found());
    }
}
