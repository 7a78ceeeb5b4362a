// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{LogLevel, ModuleKind, OrchestrationMode, UpdatePolicy};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [orchestrator]
/// segment_interval = 1000
/// store_save_interval = 10000
/// parallel_workers = 4
/// stop_block = 50000
/// mode = "stages"
///
/// [module.map_transfers]
/// kind = "map"
///
/// [module.store_balances]
/// kind = "store"
/// inputs = ["map_transfers"]
/// update_policy = "append"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub orchestrator: OrchestratorSection,

    /// Keyed by module name.
    #[serde(default)]
    pub module: BTreeMap<String, ModuleConfig>,
}

/// A validated configuration. Build it through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub orchestrator: OrchestratorSection,
    pub module: BTreeMap<String, ModuleConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        orchestrator: OrchestratorSection,
        module: BTreeMap<String, ModuleConfig>,
    ) -> Self {
        Self {
            orchestrator,
            module,
        }
    }
}

/// `[orchestrator]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSection {
    /// Width, in blocks, of one segment.
    #[serde(default = "default_segment_interval")]
    pub segment_interval: u64,

    /// Blocks between two full-store checkpoints. Defaults to
    /// `segment_interval`.
    #[serde(default)]
    pub store_save_interval: Option<u64>,

    #[serde(default = "default_parallel_workers")]
    pub parallel_workers: usize,

    /// Exclusive end of the run window.
    #[serde(default)]
    pub stop_block: u64,

    #[serde(default)]
    pub mode: OrchestrationMode,

    /// Verbosity for the embedding application to hand to
    /// [`init_logging`](crate::logging::init_logging); orchestration itself
    /// never installs a subscriber.
    #[serde(default)]
    pub log_level: Option<LogLevel>,
}

fn default_segment_interval() -> u64 {
    1000
}

fn default_parallel_workers() -> usize {
    1
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            segment_interval: default_segment_interval(),
            store_save_interval: None,
            parallel_workers: default_parallel_workers(),
            stop_block: 0,
            mode: OrchestrationMode::default(),
            log_level: None,
        }
    }
}

impl OrchestratorSection {
    pub fn effective_store_save_interval(&self) -> u64 {
        self.store_save_interval.unwrap_or(self.segment_interval)
    }
}

/// `[module.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleConfig {
    pub kind: ModuleKind,

    #[serde(default)]
    pub initial_block: u64,

    /// Modules whose output this module consumes.
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Only meaningful for stores.
    #[serde(default)]
    pub update_policy: UpdatePolicy,

    /// Namespace of the store's snapshots; the module name when unset.
    #[serde(default)]
    pub module_hash: Option<String>,
}
