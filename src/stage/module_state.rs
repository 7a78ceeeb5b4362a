// src/stage/module_state.rs

use tracing::{Span, trace};

use crate::block::{Range, Segmenter};
use crate::store::StoreConfig;
use crate::types::ModuleKind;

/// Per-module cursor inside a stage.
#[derive(Debug, Clone)]
pub struct ModuleState {
    name: String,
    kind: ModuleKind,
    segmenter: Segmenter,
    store_config: Option<StoreConfig>,
    /// Highest block merged into the module's full store so far.
    last_block_in_store: Option<u64>,
    span: Span,
}

impl ModuleState {
    pub fn new(
        parent: &Span,
        name: impl Into<String>,
        kind: ModuleKind,
        segmenter: Segmenter,
        store_config: Option<StoreConfig>,
        last_checkpoint: Option<u64>,
    ) -> Self {
        let name = name.into();
        let span = tracing::debug_span!(parent: parent, "module", module = %name);
        Self {
            name,
            kind,
            segmenter,
            store_config,
            last_block_in_store: last_checkpoint,
            span,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn is_store(&self) -> bool {
        self.kind == ModuleKind::Store
    }

    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    pub fn store_config(&self) -> Option<&StoreConfig> {
        self.store_config.as_ref()
    }

    pub fn initial_block(&self) -> u64 {
        self.segmenter.initial_block()
    }

    pub fn last_block_in_store(&self) -> Option<u64> {
        self.last_block_in_store
    }

    /// This module's slice of segment `segment`, `None` before it starts.
    pub fn range_for_segment(&self, segment: usize) -> Option<Range> {
        self.segmenter.range(segment)
    }

    /// Blocks already merged into the full store when the run started or
    /// since, starting at the module's initial block.
    pub fn initial_range(&self) -> Option<Range> {
        let last = self.last_block_in_store?;
        let range = Range::new(self.initial_block(), last);
        (!range.is_empty()).then_some(range)
    }

    pub(crate) fn mark_merged_up_to(&mut self, block: u64) {
        if self.last_block_in_store.is_none_or(|last| block > last) {
            trace!(parent: &self.span, block, "store merged up to block");
            self.last_block_in_store = Some(block);
        }
    }
}
