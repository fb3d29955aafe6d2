//! Built-in cache plugins.

pub mod comments;
pub mod votes;

use serde::de::DeserializeOwned;

use crate::error::{CacheError, CacheResult};

/// Decodes a command or reply payload, naming `what` in the error.
pub(crate) fn parse<T: DeserializeOwned>(what: &str, payload: &str) -> CacheResult<T> {
    serde_json::from_str(payload).map_err(|e| CacheError::Plugin(format!("decode {what}: {e}")))
}
