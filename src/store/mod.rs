// src/store/mod.rs

//! Contracts the orchestration core consumes from its storage collaborators.
//!
//! - [`Store`] is the handle on one module's key-value state (full or
//!   partial). The squasher only ever loads, merges, checkpoints and deletes
//!   through it; content encoding belongs to the implementation.
//! - [`Notifier`] is told about every successful merge step.
//! - [`listing`] finds previously written checkpoints so a run can resume.
//! - [`config`] holds the per-store settings.
//! - [`memory`] is an in-process implementation of all of the above.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::block::Range;
use crate::errors::StoreError;

pub mod config;
pub mod listing;
pub mod memory;
pub mod retry;

pub use config::StoreConfig;
pub use listing::{CheckpointInfo, SnapshotLister, StorageState};
pub use memory::{MemoryBackend, MemoryStore};

/// Handle on a module's store.
#[async_trait]
pub trait Store: Clone + Send + Sync + Debug + 'static {
    fn name(&self) -> &str;

    fn module_initial_block(&self) -> u64;

    /// Load the snapshot covering `range`: the full store when the range
    /// starts at the module's initial block, the partial otherwise.
    async fn load_from(&self, range: &Range) -> Result<Self, StoreError>;

    /// Fold `partial` into this store.
    fn merge(&mut self, partial: &Self) -> Result<(), StoreError>;

    /// Durably persist the current state as of `at_block`.
    async fn write_state(&self, at_block: u64) -> Result<(), StoreError>;

    /// Remove the snapshot this handle was loaded from, ending at `at_block`.
    async fn delete_store(&self, at_block: u64) -> Result<(), StoreError>;

    /// Empty store with the same configuration, starting at `initial_block`.
    fn clone_structure(&self, initial_block: u64) -> Self;
}

/// Listener told each time a store's merge cursor advances.
pub trait Notifier: Send + Sync + Debug {
    fn notify(&self, store_name: &str, block: u64);
}
