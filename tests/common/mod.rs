#![allow(dead_code)]

use blockorch::block::Range;
use blockorch::store::{MemoryBackend, MemoryStore, StoreConfig};
use blockorch::types::UpdatePolicy;
use blockorch_test_utils::fakes::MemoryExecutor;

pub fn store_config(name: &str, initial_block: u64) -> StoreConfig {
    StoreConfig::new(name, initial_block, UpdatePolicy::Set)
}

/// Backend plus an empty full store handle for `config`.
pub fn backend_with_store(config: &StoreConfig) -> (MemoryBackend, MemoryStore) {
    let backend = MemoryBackend::new();
    let store = backend.store(config.clone());
    (backend, store)
}

/// Write the partial a worker would produce for each of `ranges`.
pub async fn write_partials(backend: &MemoryBackend, config: &StoreConfig, ranges: &[Range]) {
    let executor = MemoryExecutor::new(backend.clone(), [config.clone()]);
    for range in ranges {
        executor
            .write_partial(config.name(), *range)
            .await
            .expect("writing partial");
    }
}

/// `[start, start+step), [start+step, start+2*step), ...` up to `end`.
pub fn segments(start: u64, end: u64, step: u64) -> Vec<Range> {
    let mut out = Vec::new();
    let mut s = start;
    while s < end {
        let e = ((s / step + 1) * step).min(end);
        out.push(Range::new(s, e));
        s = e;
    }
    out
}
