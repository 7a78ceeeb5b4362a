// src/store/memory.rs

//! In-process store backend.
//!
//! Snapshots live in a shared map keyed by namespace (the store's module
//! hash) and file name, using the same `{end}-{start}.kv|partial` naming
//! that [`crate::store::listing`] parses. Useful for embedding the
//! orchestrator without object storage and for tests; listing failures can
//! be injected with [`MemoryBackend::fail_next_listings`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::block::Range;
use crate::errors::StoreError;
use crate::store::listing::{full_file_name, partial_file_name};
use crate::store::{SnapshotLister, Store, StoreConfig};
use crate::types::UpdatePolicy;

type Snapshot = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Default)]
struct BackendInner {
    namespaces: HashMap<String, BTreeMap<String, Snapshot>>,
    failing_listings: u32,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<BackendInner>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty full store for `config`, starting at its module's initial block.
    pub fn store(&self, config: StoreConfig) -> MemoryStore {
        let initial_block = config.module_initial_block();
        MemoryStore {
            backend: self.clone(),
            config: Arc::new(config),
            initial_block,
            kv: Snapshot::new(),
        }
    }

    /// Make the next `count` listings fail with a transient error.
    pub fn fail_next_listings(&self, count: u32) {
        self.inner.lock().failing_listings = count;
    }

    /// File names present under `namespace`, sorted.
    pub fn files(&self, namespace: &str) -> Vec<String> {
        self.inner
            .lock()
            .namespaces
            .get(namespace)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_file(&self, namespace: &str, filename: &str) -> bool {
        self.inner
            .lock()
            .namespaces
            .get(namespace)
            .is_some_and(|files| files.contains_key(filename))
    }

    fn put(&self, namespace: &str, filename: String, snapshot: Snapshot) {
        self.inner
            .lock()
            .namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(filename, snapshot);
    }

    fn get(&self, namespace: &str, filename: &str) -> Option<Snapshot> {
        self.inner
            .lock()
            .namespaces
            .get(namespace)
            .and_then(|files| files.get(filename).cloned())
    }

    fn remove(&self, namespace: &str, filename: &str) -> bool {
        self.inner
            .lock()
            .namespaces
            .get_mut(namespace)
            .is_some_and(|files| files.remove(filename).is_some())
    }
}

#[async_trait]
impl SnapshotLister for MemoryBackend {
    async fn list_files(&self, namespace: &str) -> Result<Vec<String>, StoreError> {
        let mut inner = self.inner.lock();
        if inner.failing_listings > 0 {
            inner.failing_listings -= 1;
            return Err(StoreError::Unavailable(format!(
                "listing namespace {namespace:?}: injected failure"
            )));
        }
        Ok(inner
            .namespaces
            .get(namespace)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default())
    }
}

/// Key-value store held in memory, persisted into a [`MemoryBackend`].
///
/// A store whose initial block equals its module's initial block is a full
/// store and is saved as `.kv`; any other is a partial and saved as
/// `.partial`.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    backend: MemoryBackend,
    config: Arc<StoreConfig>,
    initial_block: u64,
    kv: Snapshot,
}

impl MemoryStore {
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn initial_block(&self) -> u64 {
        self.initial_block
    }

    pub fn is_partial(&self) -> bool {
        self.initial_block != self.config.module_initial_block()
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.kv.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.kv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kv.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.kv.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Write `value` under `key` following the store's update policy.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Vec<u8>>,
    ) -> Result<(), StoreError> {
        self.apply(key.into(), value.into())
    }

    fn file_name(&self, end_block: u64) -> String {
        if self.is_partial() {
            partial_file_name(end_block, self.initial_block)
        } else {
            full_file_name(end_block, self.initial_block)
        }
    }

    fn apply(&mut self, key: String, value: Vec<u8>) -> Result<(), StoreError> {
        if value.len() as u64 > self.config.item_size_limit() {
            return Err(StoreError::LimitExceeded {
                store: self.config.name().to_string(),
                message: format!(
                    "value for key {key:?} is {} bytes, above the item size limit of {}",
                    value.len(),
                    self.config.item_size_limit()
                ),
            });
        }

        match self.config.update_policy() {
            UpdatePolicy::Set => {
                self.kv.insert(key, value);
            }
            UpdatePolicy::SetIfNotExists => {
                self.kv.entry(key).or_insert(value);
            }
            UpdatePolicy::Append => {
                let limit = self.config.append_limit();
                let existing = self.kv.entry(key.clone()).or_default();
                if (existing.len() + value.len()) as u64 > limit {
                    return Err(StoreError::LimitExceeded {
                        store: self.config.name().to_string(),
                        message: format!(
                            "append to key {key:?} exceeds the append limit of {limit} bytes"
                        ),
                    });
                }
                existing.extend_from_slice(&value);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &str {
        self.config.name()
    }

    fn module_initial_block(&self) -> u64 {
        self.config.module_initial_block()
    }

    async fn load_from(&self, range: &Range) -> Result<Self, StoreError> {
        let loaded = self.clone_structure(range.start_block);
        let filename = loaded.file_name(range.exclusive_end_block);

        let kv = self
            .backend
            .get(self.config.module_hash(), &filename)
            .ok_or_else(|| StoreError::NotFound {
                store: self.config.name().to_string(),
                range: *range,
            })?;

        Ok(MemoryStore { kv, ..loaded })
    }

    fn merge(&mut self, partial: &Self) -> Result<(), StoreError> {
        for (key, value) in &partial.kv {
            self.apply(key.clone(), value.clone())?;
        }
        Ok(())
    }

    async fn write_state(&self, at_block: u64) -> Result<(), StoreError> {
        self.backend
            .put(self.config.module_hash(), self.file_name(at_block), self.kv.clone());
        Ok(())
    }

    async fn delete_store(&self, at_block: u64) -> Result<(), StoreError> {
        let filename = self.file_name(at_block);
        if self.backend.remove(self.config.module_hash(), &filename) {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                store: self.config.name().to_string(),
                range: Range::new(self.initial_block, at_block),
            })
        }
    }

    fn clone_structure(&self, initial_block: u64) -> Self {
        MemoryStore {
            backend: self.backend.clone(),
            config: Arc::clone(&self.config),
            initial_block,
            kv: Snapshot::new(),
        }
    }
}
