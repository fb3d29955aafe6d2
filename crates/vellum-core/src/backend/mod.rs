//! Storage engines behind [`crate::store::Backend`].

mod memory;
mod sled;
mod sqlite;

pub use memory::MemoryBackend;
pub use self::sled::SledBackend;
pub use sqlite::SqliteBackend;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// On-disk engine selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Embedded single-process engine.
    #[default]
    Sled,
    /// Transactional SQL engine.
    Sqlite,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sled => f.write_str("sled"),
            Self::Sqlite => f.write_str("sqlite"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sled" | "leveldb" => Ok(Self::Sled),
            "sqlite" | "sql" => Ok(Self::Sqlite),
            other => Err(format!("unknown backend: {other}")),
        }
    }
}
