#![allow(dead_code)]

use std::collections::BTreeMap;

use blockorch::config::{ConfigFile, ModuleConfig, OrchestratorSection, RawConfigFile};
use blockorch::types::{ModuleKind, OrchestrationMode, UpdatePolicy};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                orchestrator: OrchestratorSection::default(),
                module: BTreeMap::new(),
            },
        }
    }

    pub fn with_module(mut self, name: &str, module: ModuleConfig) -> Self {
        self.config.module.insert(name.to_string(), module);
        self
    }

    pub fn segment_interval(mut self, interval: u64) -> Self {
        self.config.orchestrator.segment_interval = interval;
        self
    }

    pub fn store_save_interval(mut self, interval: u64) -> Self {
        self.config.orchestrator.store_save_interval = Some(interval);
        self
    }

    pub fn parallel_workers(mut self, workers: usize) -> Self {
        self.config.orchestrator.parallel_workers = workers;
        self
    }

    pub fn stop_block(mut self, block: u64) -> Self {
        self.config.orchestrator.stop_block = block;
        self
    }

    pub fn mode(mut self, mode: OrchestrationMode) -> Self {
        self.config.orchestrator.mode = mode;
        self
    }

    /// The raw model, for tests exercising validation.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ModuleConfig`.
pub struct ModuleConfigBuilder {
    module: ModuleConfig,
}

impl ModuleConfigBuilder {
    pub fn new(kind: ModuleKind) -> Self {
        Self {
            module: ModuleConfig {
                kind,
                initial_block: 0,
                inputs: vec![],
                update_policy: UpdatePolicy::default(),
                module_hash: None,
            },
        }
    }

    pub fn map() -> Self {
        Self::new(ModuleKind::Map)
    }

    pub fn store() -> Self {
        Self::new(ModuleKind::Store)
    }

    pub fn initial_block(mut self, block: u64) -> Self {
        self.module.initial_block = block;
        self
    }

    pub fn input(mut self, name: &str) -> Self {
        self.module.inputs.push(name.to_string());
        self
    }

    pub fn update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.module.update_policy = policy;
        self
    }

    pub fn module_hash(mut self, hash: &str) -> Self {
        self.module.module_hash = Some(hash.to_string());
        self
    }

    pub fn build(self) -> ModuleConfig {
        self.module
    }
}
