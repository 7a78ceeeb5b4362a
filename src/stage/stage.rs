// src/stage/stage.rs

use crate::block::Segmenter;
use crate::graph::ModuleInfo;
use crate::stage::module_state::ModuleState;
use crate::stage::unit::Unit;
use crate::types::ModuleKind;

/// Modules sharing one DAG depth, scheduled and merged together per segment.
#[derive(Debug, Clone)]
pub struct Stage {
    /// Position among the scheduled stages (the `stage` of its units).
    idx: usize,
    /// Depth in the module graph.
    depth: usize,
    kind: ModuleKind,
    /// Anchored at the lowest initial block among the stage's modules.
    segmenter: Segmenter,
    module_states: Vec<ModuleState>,
    /// Next segment to merge.
    merge_cursor: usize,
}

impl Stage {
    pub fn new(
        idx: usize,
        depth: usize,
        kind: ModuleKind,
        segmenter: Segmenter,
        module_states: Vec<ModuleState>,
    ) -> Self {
        Self {
            idx,
            depth,
            kind,
            merge_cursor: segmenter.first_index(),
            segmenter,
            module_states,
        }
    }

    pub fn idx(&self) -> usize {
        self.idx
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    pub fn module_states(&self) -> &[ModuleState] {
        &self.module_states
    }

    pub(crate) fn module_states_mut(&mut self) -> &mut [ModuleState] {
        &mut self.module_states
    }

    pub fn merge_cursor(&self) -> usize {
        self.merge_cursor
    }

    /// The unit this stage merges next.
    pub fn next_unit(&self) -> Unit {
        Unit::new(self.merge_cursor, self.idx)
    }

    pub(crate) fn mark_segment_completed(&mut self, segment: usize) {
        if segment >= self.merge_cursor {
            self.merge_cursor = segment + 1;
        }
    }
}

/// A stage holding any store is a store stage.
pub fn stage_kind(modules: &[ModuleInfo]) -> ModuleKind {
    if modules.iter().any(|m| m.kind == ModuleKind::Store) {
        ModuleKind::Store
    } else {
        ModuleKind::Map
    }
}
