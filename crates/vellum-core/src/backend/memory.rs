use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::StoreResult;
use crate::store::Backend;

/// Volatile backend for tests and tooling. Clones share one keyspace.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.entries.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.entries.write().unwrap_or_else(|p| p.into_inner())
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn put_raw(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn insert_raw(&self, key: &str, value: &[u8]) -> StoreResult<bool> {
        match self.write().entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(value.to_vec());
                Ok(true)
            }
        }
    }

    fn get_raw(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.read().get(key).cloned())
    }

    fn has(&self, key: &str) -> StoreResult<bool> {
        Ok(self.read().contains_key(key))
    }

    fn for_each_raw(&self, f: &mut dyn FnMut(&str, &[u8]) -> StoreResult<()>) -> StoreResult<()> {
        // Copy out first so callbacks may write back without deadlocking.
        let entries: Vec<(String, Vec<u8>)> = self
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (k, v) in &entries {
            f(k, v)?;
        }
        Ok(())
    }

    fn close(self) -> StoreResult<()> {
        Ok(())
    }
}
