// src/store/listing.rs

//! Discovery of previously written store snapshots.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use crate::context::RunContext;
use crate::errors::StoreError;
use crate::store::StoreConfig;
use crate::store::retry::{DEFAULT_ATTEMPTS, DEFAULT_DELAY, retry};

static SNAPSHOT_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)-(\d+)\.(kv|partial)$").expect("snapshot file name regex is valid")
});

/// One snapshot found in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointInfo {
    pub filename: String,
    pub start_block: u64,
    pub end_block: u64,
    /// `true` for a partial (single segment) snapshot, `false` for a full store.
    pub partial: bool,
}

/// `{end:010}-{start:010}.kv`
pub fn full_file_name(end_block: u64, start_block: u64) -> String {
    format!("{end_block:010}-{start_block:010}.kv")
}

/// `{end:010}-{start:010}.partial`
pub fn partial_file_name(end_block: u64, start_block: u64) -> String {
    format!("{end_block:010}-{start_block:010}.partial")
}

pub fn parse_file_name(filename: &str) -> Option<CheckpointInfo> {
    let caps = SNAPSHOT_FILE_RE.captures(filename)?;
    let end_block = caps[1].parse().ok()?;
    let start_block = caps[2].parse().ok()?;
    Some(CheckpointInfo {
        filename: filename.to_string(),
        start_block,
        end_block,
        partial: &caps[3] == "partial",
    })
}

/// Object listing of a store namespace.
#[async_trait]
pub trait SnapshotLister: Send + Sync {
    /// Every object name under `namespace`, in any order. Transient failures
    /// are reported as [`StoreError::Unavailable`].
    async fn list_files(&self, namespace: &str) -> Result<Vec<String>, StoreError>;
}

/// Snapshots of `namespace` ending at or below `below`, sorted by end block.
///
/// Unrecognised object names are skipped. Listing is retried a bounded
/// number of times on transient failures.
pub async fn list_snapshot_files(
    ctx: &RunContext,
    lister: &dyn SnapshotLister,
    namespace: &str,
    below: u64,
) -> Result<Vec<CheckpointInfo>, StoreError> {
    if below == 0 {
        return Ok(Vec::new());
    }

    let names = retry(ctx, DEFAULT_ATTEMPTS, DEFAULT_DELAY, || lister.list_files(namespace)).await?;

    let mut files: Vec<CheckpointInfo> = names
        .iter()
        .filter_map(|name| parse_file_name(name))
        .filter(|info| info.end_block <= below)
        .collect();
    files.sort_by_key(|info| (info.end_block, info.start_block));

    debug!(parent: ctx.span(), namespace, below, found = files.len(), "listed snapshot files");
    Ok(files)
}

/// Highest full checkpoint block per store name, as found in storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageState {
    last_blocks: HashMap<String, u64>,
}

impl StorageState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_last_block(mut self, store_name: impl Into<String>, block: u64) -> Self {
        self.last_blocks.insert(store_name.into(), block);
        self
    }

    /// Last checkpointed block for the store, if any checkpoint exists.
    pub fn last_block(&self, store_name: &str) -> Option<u64> {
        self.last_blocks.get(store_name).copied().filter(|b| *b != 0)
    }

    /// Look up every store's most recent full checkpoint strictly usable for a
    /// request ending at `below`.
    ///
    /// Only full snapshots ending on a `store_save_interval` boundary count.
    /// A worker's first-segment output is also a full snapshot but may end
    /// anywhere, and seeding from it would leave the next segment straddling
    /// the seed block.
    pub async fn fetch(
        ctx: &RunContext,
        lister: &dyn SnapshotLister,
        configs: &[StoreConfig],
        store_save_interval: u64,
        below: u64,
    ) -> Result<Self, StoreError> {
        let mut state = StorageState::new();
        let store_save_interval = store_save_interval.max(1);

        for config in configs {
            let files = list_snapshot_files(ctx, lister, config.module_hash(), below).await?;
            let last = files
                .iter()
                .filter(|f| !f.partial && f.start_block == config.module_initial_block())
                .filter(|f| f.end_block % store_save_interval == 0)
                .map(|f| f.end_block)
                .max();

            if let Some(block) = last {
                info!(
                    parent: ctx.span(),
                    store = %config.name(),
                    block,
                    "found existing full store checkpoint"
                );
                state.last_blocks.insert(config.name().to_string(), block);
            }
        }

        Ok(state)
    }
}
