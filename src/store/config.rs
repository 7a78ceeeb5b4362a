// src/store/config.rs

use crate::types::UpdatePolicy;

/// 8 MiB
pub const DEFAULT_APPEND_LIMIT: u64 = 8_388_608;
/// 10 MiB
pub const DEFAULT_ITEM_SIZE_LIMIT: u64 = 10_485_760;

/// Static settings of one store module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    name: String,
    module_hash: String,
    module_initial_block: u64,
    update_policy: UpdatePolicy,
    append_limit: u64,
    item_size_limit: u64,
}

impl StoreConfig {
    /// `module_hash` namespaces the store's snapshots in object storage; it
    /// defaults to the module name when the caller has no content hash.
    pub fn new(
        name: impl Into<String>,
        module_initial_block: u64,
        update_policy: UpdatePolicy,
    ) -> Self {
        let name = name.into();
        Self {
            module_hash: name.clone(),
            name,
            module_initial_block,
            update_policy,
            append_limit: DEFAULT_APPEND_LIMIT,
            item_size_limit: DEFAULT_ITEM_SIZE_LIMIT,
        }
    }

    pub fn with_module_hash(mut self, hash: impl Into<String>) -> Self {
        self.module_hash = hash.into();
        self
    }

    pub fn with_limits(mut self, append_limit: u64, item_size_limit: u64) -> Self {
        self.append_limit = append_limit;
        self.item_size_limit = item_size_limit;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module_hash(&self) -> &str {
        &self.module_hash
    }

    pub fn module_initial_block(&self) -> u64 {
        self.module_initial_block
    }

    pub fn update_policy(&self) -> UpdatePolicy {
        self.update_policy
    }

    pub fn append_limit(&self) -> u64 {
        self.append_limit
    }

    pub fn item_size_limit(&self) -> u64 {
        self.item_size_limit
    }
}
