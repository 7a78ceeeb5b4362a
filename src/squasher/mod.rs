// src/squasher/mod.rs

//! Produces complete stores by merging partial stores in block order.
//!
//! The [`Squasher`] owns one [`Squashable`] per store. Each squashable sits
//! behind its own async mutex, so store I/O on one store never holds up a
//! squash of another, while merges into the same store stay serialized.

mod squashable;

pub use squashable::Squashable;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{Span, debug, info};

use crate::block::Range;
use crate::context::RunContext;
use crate::errors::SquashError;
use crate::store::{Notifier, StorageState, Store};

pub struct Squasher<S: Store> {
    squashables: HashMap<String, Mutex<Squashable<S>>>,
    store_save_interval: u64,
    target_exclusive_block: u64,
    notifier: Option<Arc<dyn Notifier>>,
    ctx: RunContext,
    span: Span,
}

impl<S: Store> std::fmt::Debug for Squasher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Squasher")
            .field("stores", &self.squashables.keys().collect::<Vec<_>>())
            .field("store_save_interval", &self.store_save_interval)
            .field("target_exclusive_block", &self.target_exclusive_block)
            .finish_non_exhaustive()
    }
}

impl<S: Store> Squasher<S> {
    /// Build one squashable per store.
    ///
    /// Stores with a checkpoint in `storage_state` are loaded from it and
    /// resume merging at the checkpoint block; the others start empty at
    /// their module's initial block.
    pub async fn new(
        ctx: &RunContext,
        storage_state: &StorageState,
        stores: Vec<S>,
        store_save_interval: u64,
        target_exclusive_block: u64,
    ) -> Result<Self, SquashError> {
        let span = tracing::info_span!(parent: ctx.span(), "squasher");
        let mut squashables = HashMap::new();

        for store in stores {
            let name = store.name().to_string();
            let module_initial_block = store.module_initial_block();

            let squashable = match storage_state.last_block(&name) {
                None => {
                    debug!(parent: &span, store = %name, "no checkpoint found; starting empty");
                    Squashable::new(
                        store.clone_structure(module_initial_block),
                        target_exclusive_block,
                        store_save_interval,
                        module_initial_block,
                    )
                }
                Some(last_block) => {
                    let range = Range::new(module_initial_block, last_block);
                    let loaded = store
                        .load_from(&range)
                        .await
                        .map_err(|source| SquashError::Load {
                            module: name.clone(),
                            range,
                            source,
                        })?;
                    info!(parent: &span, store = %name, %range, "resuming store from checkpoint");
                    Squashable::new(loaded, target_exclusive_block, store_save_interval, last_block)
                }
            };

            squashables.insert(name, Mutex::new(squashable));
        }

        Ok(Self {
            squashables,
            store_save_interval,
            target_exclusive_block,
            notifier: None,
            ctx: ctx.clone(),
            span,
        })
    }

    /// Listener told of every successful merge step.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn store_save_interval(&self) -> u64 {
        self.store_save_interval
    }

    pub fn target_exclusive_block(&self) -> u64 {
        self.target_exclusive_block
    }

    pub fn contains(&self, store_name: &str) -> bool {
        self.squashables.contains_key(store_name)
    }

    pub fn store_names(&self) -> impl Iterator<Item = &str> {
        self.squashables.keys().map(String::as_str)
    }

    /// Accept the partial produced for `range` and merge everything that has
    /// become contiguous with the store's merge cursor.
    pub async fn squash(&self, module_name: &str, range: Range) -> Result<(), SquashError> {
        let squashable = self
            .squashables
            .get(module_name)
            .ok_or_else(|| SquashError::UnknownModule(module_name.to_string()))?;

        let mut squashable = squashable.lock().await;
        squashable
            .squash(&self.ctx, &self.span, range, self.notifier.as_deref())
            .await
    }

    /// Current merge cursor of a store.
    pub async fn next_expected_start_block(&self, store_name: &str) -> Option<u64> {
        let squashable = self.squashables.get(store_name)?;
        Some(squashable.lock().await.next_expected_start_block())
    }

    /// The completed stores, if every store reached the target block with
    /// nothing left unmerged; otherwise a diagnostic listing each shortfall.
    pub async fn stores_ready(&self) -> Result<BTreeMap<String, S>, SquashError> {
        let mut out = BTreeMap::new();
        let mut errs = Vec::new();

        for (name, squashable) in &self.squashables {
            let squashable = squashable.lock().await;
            if !squashable.target_reached() {
                errs.push(format!("module {name:?} target not reached"));
            }
            if !squashable.is_empty() {
                errs.push(format!("module {name:?} missing ranges {}", squashable.ranges()));
            }
            out.insert(name.clone(), squashable.store().clone());
        }

        if !errs.is_empty() {
            errs.sort();
            return Err(SquashError::NotReady(errs.join("; ")));
        }
        Ok(out)
    }
}
