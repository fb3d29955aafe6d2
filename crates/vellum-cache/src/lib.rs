//! Vellum cache: versioned content records mirrored from the write path.
//!
//! [`SqliteCache`] keeps every `(token, version)`, tracks the latest version per
//! token, answers inventory queries over latest versions only, and routes
//! [`PluginCommand`]s to registered [`PluginDriver`]s.

pub mod cache;
pub mod error;
pub mod plugin;
pub mod plugins;
pub mod record;

pub use cache::{BuildState, Cache, RecordReader, SqliteCache, CACHE_VERSION};
pub use error::{CacheError, CacheResult};
pub use plugin::{
    builtin_driver, Plugin, PluginCommand, PluginCommandReply, PluginDriver, PluginRegistry,
    PluginSetting,
};
pub use record::{
    version_ord, CensorshipRecord, File, InventoryStats, MetadataStream, Record, RecordStatus,
    INITIAL_VERSION,
};
