//! Vellum core: an encrypted key-value store with a version bootstrap.
//!
//! Payloads pass through the [`codec`] (record kind + record version envelope), are
//! sealed by the [`crypto`] context (AES-256-GCM with the schema version bound in)
//! and land in a [`Backend`] (sled or SQLite). Every [`store::EncryptedStore`] open
//! runs the [`bootstrap`] protocol against the `userversion` marker first.

pub mod accounts;
pub mod backend;
pub mod backup;
pub mod bootstrap;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod lifecycle;
pub mod schema;
pub mod store;

pub use accounts::{Accounts, Identity, User};
pub use backend::{BackendKind, MemoryBackend, SledBackend, SqliteBackend};
pub use bootstrap::{BootstrapFailure, BootstrapState, Bootstrapper};
pub use codec::{Codec, RecordType, VersionRecord, SCHEMA_VERSION, VERSION_KEY};
pub use config::{create_store, open_store, StoreConfig};
pub use crypto::{CryptoError, EncryptionContext, EncryptionKey};
pub use error::{StoreError, StoreResult};
pub use lifecycle::{Lifecycle, ShutdownError};
pub use schema::{Column, ColumnType, Index, TableSchema};
pub use store::{Backend, EncryptedStore, KeyValueStore, RawSnapshot, Snapshot};

/// Store over the embedded engine.
pub type SledStore = EncryptedStore<SledBackend>;
/// Store over the SQL engine.
pub type SqliteStore = EncryptedStore<SqliteBackend>;
