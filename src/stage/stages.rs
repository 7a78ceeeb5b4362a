// src/stage/stages.rs

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{Span, debug, info, trace, warn};

use crate::block::{Range, Segmenter};
use crate::context::RunContext;
use crate::errors::SquashError;
use crate::graph::ModuleInfo;
use crate::squasher::Squasher;
use crate::stage::module_state::ModuleState;
use crate::stage::scheduled::{ScheduledModule, ScheduledUnit};
use crate::stage::stage::{Stage, stage_kind};
use crate::stage::unit::{Unit, UnitState};
use crate::store::{StorageState, Store, StoreConfig};
use crate::types::ModuleKind;

/// Squash work for one unit, run off the scheduling loop.
pub type MergeTask = Pin<Box<dyn Future<Output = MergeMsg> + Send + 'static>>;

/// Outcome of a [`MergeTask`], fed back into the scheduling loop.
#[derive(Debug)]
pub enum MergeMsg {
    Finished { unit: Unit },
    Failed { unit: Unit, error: SquashError },
}

/// What [`Stages::cmd_merge`] asks the driver to do.
pub enum MergeCommand {
    /// Every store stage has merged its last segment. Emitted once.
    StoresCompleted,
    Merge { unit: Unit, task: MergeTask },
}

impl fmt::Debug for MergeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeCommand::StoresCompleted => f.write_str("StoresCompleted"),
            MergeCommand::Merge { unit, .. } => f
                .debug_struct("Merge")
                .field("unit", unit)
                .finish_non_exhaustive(),
        }
    }
}

/// The `[segment][stage]` unit matrix and the scheduling rules over it.
///
/// Unit `(s, k)` may run once every stage below `k` has completed segment
/// `s - 1`, which lets stage `k` compute segment `s` while stage `k - 1`
/// computes segment `s + 1`. Merges of a stage proceed strictly in segment
/// order.
pub struct Stages<S: Store> {
    segmenter: Segmenter,
    stages: Vec<Stage>,
    /// Row-major, `stages.len()` entries per row, one row per segment
    /// starting at `segment_offset`.
    segment_states: Vec<UnitState>,
    rows: usize,
    segment_offset: usize,
    squasher: Arc<Squasher<S>>,
    stores_completed_emitted: bool,
    span: Span,
}

impl<S: Store> fmt::Debug for Stages<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stages")
            .field("segmenter", &self.segmenter)
            .field("stages", &self.stages.len())
            .field("rows", &self.rows)
            .field("segment_offset", &self.segment_offset)
            .finish_non_exhaustive()
    }
}

impl<S: Store> Stages<S> {
    /// Build the scheduler from modules grouped by graph depth.
    ///
    /// `segmenter` spans the whole run window starting at the lowest module
    /// initial block. Map stages other than the last one are not scheduled:
    /// their output is recomputed inline by the stages that consume it.
    /// Segments a store stage already holds checkpoints for start out
    /// `Completed`.
    pub fn new(
        ctx: &RunContext,
        staged_modules: &[Vec<ModuleInfo>],
        segmenter: Segmenter,
        store_configs: &BTreeMap<String, StoreConfig>,
        storage_state: &StorageState,
        squasher: Arc<Squasher<S>>,
    ) -> Self {
        let span = tracing::info_span!(parent: ctx.span(), "stages");
        let last_depth = staged_modules.len().saturating_sub(1);
        let mut stages = Vec::with_capacity(staged_modules.len());

        for (depth, modules) in staged_modules.iter().enumerate() {
            if modules.is_empty() {
                continue;
            }
            let kind = stage_kind(modules);
            if kind == ModuleKind::Map && depth != last_depth {
                debug!(parent: &span, depth, "skipping intermediate map stage");
                continue;
            }

            let stage_initial_block = modules
                .iter()
                .map(|m| m.initial_block)
                .min()
                .unwrap_or_default()
                .max(segmenter.initial_block());

            let module_states = modules
                .iter()
                .map(|m| {
                    let last_checkpoint = match m.kind {
                        ModuleKind::Store => storage_state.last_block(&m.name),
                        ModuleKind::Map => None,
                    };
                    ModuleState::new(
                        &span,
                        m.name.clone(),
                        m.kind,
                        segmenter.with_initial_block(m.initial_block),
                        store_configs.get(&m.name).cloned(),
                        last_checkpoint,
                    )
                })
                .collect();

            let idx = stages.len();
            stages.push(Stage::new(
                idx,
                depth,
                kind,
                segmenter.with_initial_block(stage_initial_block),
                module_states,
            ));
        }

        let mut this = Self {
            segment_offset: segmenter.first_index(),
            segmenter,
            stages,
            segment_states: Vec::new(),
            rows: 0,
            squasher,
            stores_completed_emitted: false,
            span,
        };
        this.apply_checkpoints();

        info!(
            parent: &this.span,
            stages = this.stages.len(),
            segments = this.segmenter.count(),
            first_segment = this.segmenter.first_index(),
            last_segment = this.segmenter.last_index(),
            "stages initialized"
        );
        this
    }

    fn apply_checkpoints(&mut self) {
        let last_index = self.segmenter.last_index();
        for stage_idx in 0..self.stages.len() {
            let stage = &self.stages[stage_idx];
            if stage.kind() != ModuleKind::Store {
                continue;
            }

            let Some(resume_block) = stage
                .module_states()
                .iter()
                .filter(|m| m.is_store())
                .map(|m| m.last_block_in_store().unwrap_or(m.initial_block()))
                .min()
            else {
                continue;
            };

            let first = stage.segmenter().first_index();
            let mut completed = Vec::new();
            for segment in first..=last_index {
                match stage.segmenter().range(segment) {
                    Some(range) if range.exclusive_end_block <= resume_block => {
                        completed.push(segment)
                    }
                    _ => break,
                }
            }

            if let Some(last) = completed.last() {
                debug!(
                    parent: &self.span,
                    stage = stage_idx,
                    up_to_segment = last,
                    resume_block,
                    "segments restored from checkpoints"
                );
            }
            for segment in completed {
                let unit = Unit::new(segment, stage_idx);
                self.set_state(unit, UnitState::Completed);
                self.stages[stage_idx].mark_segment_completed(segment);
            }
        }
    }

    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    pub fn segment_offset(&self) -> usize {
        self.segment_offset
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn squasher(&self) -> &Arc<Squasher<S>> {
        &self.squasher
    }

    /// State of `unit`. Segments before the run window or before the stage's
    /// own first segment read as `Completed`.
    pub fn get_state(&self, unit: Unit) -> UnitState {
        let Some(stage) = self.stages.get(unit.stage) else {
            return UnitState::Completed;
        };
        if unit.segment < self.segment_offset || unit.segment < stage.segmenter().first_index() {
            return UnitState::Completed;
        }
        let row = unit.segment - self.segment_offset;
        if row >= self.rows {
            return UnitState::Pending;
        }
        self.segment_states[row * self.stages.len() + unit.stage]
    }

    fn ensure_rows(&mut self, rows: usize) {
        if rows <= self.rows {
            return;
        }
        let mut new_rows = self.rows.max(1);
        while new_rows < rows {
            new_rows *= 2;
        }
        self.segment_states
            .resize(new_rows * self.stages.len(), UnitState::Pending);
        self.rows = new_rows;
    }

    fn set_state(&mut self, unit: Unit, state: UnitState) {
        if unit.stage >= self.stages.len() {
            warn!(parent: &self.span, %unit, "unknown stage");
            return;
        }
        let Some(row) = unit.segment.checked_sub(self.segment_offset) else {
            return;
        };
        self.ensure_rows(row + 1);

        let idx = row * self.stages.len() + unit.stage;
        let current = self.segment_states[idx];
        if state < current {
            warn!(
                parent: &self.span,
                %unit,
                ?current,
                requested = ?state,
                "ignoring backwards unit state transition"
            );
            return;
        }
        trace!(parent: &self.span, %unit, ?state, "unit state");
        self.segment_states[idx] = state;
    }

    pub fn mark_segment_scheduled(&mut self, unit: Unit) {
        self.set_state(unit, UnitState::Scheduled);
    }

    pub fn mark_partial_present(&mut self, unit: Unit) {
        self.set_state(unit, UnitState::PartialPresent);
    }

    pub fn mark_segment_merging(&mut self, unit: Unit) {
        self.set_state(unit, UnitState::Merging);
    }

    /// Next unit that can be computed, already marked `Scheduled`.
    ///
    /// `None` means nothing is runnable right now, not that the run is over.
    pub fn next_job(&mut self) -> Option<(Unit, Range)> {
        let first = self.segmenter.first_index();
        let last = self.segmenter.last_index();

        for segment in first..=last {
            for stage_idx in (0..self.stages.len()).rev() {
                let unit = Unit::new(segment, stage_idx);
                let stage = &self.stages[stage_idx];

                if segment < stage.segmenter().first_index() {
                    continue;
                }
                if self.get_state(unit) != UnitState::Pending {
                    continue;
                }
                if !self.dependencies_completed(unit) {
                    continue;
                }
                let Some(range) = stage.segmenter().range(segment) else {
                    continue;
                };

                self.mark_segment_scheduled(unit);
                debug!(parent: &self.span, %unit, %range, "scheduling unit");
                return Some((unit, range));
            }
        }
        None
    }

    /// Worker-facing description of a scheduled unit.
    pub fn scheduled_unit(&self, unit: Unit, range: Range) -> Option<ScheduledUnit> {
        let stage = self.stages.get(unit.stage)?;
        let modules = stage
            .module_states()
            .iter()
            .map(|m| ScheduledModule {
                name: m.name().to_string(),
                kind: m.kind(),
                range: m.range_for_segment(unit.segment),
            })
            .collect();
        Some(ScheduledUnit::new(unit, range, modules))
    }

    fn dependencies_completed(&self, unit: Unit) -> bool {
        let Some(stage) = self.stages.get(unit.stage) else {
            return false;
        };
        if unit.segment <= stage.segmenter().first_index() || unit.stage == 0 {
            return true;
        }
        (0..unit.stage)
            .all(|dep| self.get_state(Unit::new(unit.segment - 1, dep)) == UnitState::Completed)
    }

    fn previous_unit_complete(&self, unit: Unit) -> bool {
        let Some(stage) = self.stages.get(unit.stage) else {
            return false;
        };
        if unit.segment <= self.segment_offset || unit.segment <= stage.segmenter().first_index() {
            return true;
        }
        self.get_state(Unit::new(unit.segment - 1, unit.stage)) == UnitState::Completed
    }

    /// Next merge for stage `stage_idx`, if one can start now.
    pub fn cmd_merge(&mut self, stage_idx: usize) -> Option<MergeCommand> {
        if self.all_stages_finished() {
            if self.stores_completed_emitted {
                return None;
            }
            self.stores_completed_emitted = true;
            info!(parent: &self.span, "all store stages completed");
            return Some(MergeCommand::StoresCompleted);
        }

        let stage = self.stages.get(stage_idx)?;
        let unit = stage.next_unit();

        if unit.segment > self.segmenter.last_index() {
            return None;
        }
        if !self.previous_unit_complete(unit) {
            return None;
        }
        if self.get_state(unit) != UnitState::PartialPresent {
            return None;
        }

        let work: Vec<(String, Range)> = stage
            .module_states()
            .iter()
            .filter(|m| m.is_store())
            .filter_map(|m| m.range_for_segment(unit.segment).map(|r| (m.name().to_string(), r)))
            .collect();

        self.mark_segment_merging(unit);
        debug!(parent: &self.span, %unit, stores = work.len(), "merging unit");

        let squasher = Arc::clone(&self.squasher);
        let task: MergeTask = Box::pin(async move {
            for (module, range) in work {
                if let Err(error) = squasher.squash(&module, range).await {
                    return MergeMsg::Failed { unit, error };
                }
            }
            MergeMsg::Finished { unit }
        });

        Some(MergeCommand::Merge { unit, task })
    }

    /// [`Stages::cmd_merge`] for every stage.
    pub fn cmd_start_merge(&mut self) -> Vec<MergeCommand> {
        // Without any stage, one call still reports completion.
        (0..self.stages.len().max(1))
            .filter_map(|idx| self.cmd_merge(idx))
            .collect()
    }

    pub fn merge_completed(&mut self, unit: Unit) {
        let Some(stage) = self.stages.get_mut(unit.stage) else {
            warn!(parent: &self.span, %unit, "merge completed for unknown stage");
            return;
        };

        stage.mark_segment_completed(unit.segment);
        for module in stage.module_states_mut() {
            if !module.is_store() {
                continue;
            }
            if let Some(range) = module.range_for_segment(unit.segment) {
                module.mark_merged_up_to(range.exclusive_end_block);
            }
        }

        self.set_state(unit, UnitState::Completed);
        debug!(parent: &self.span, %unit, "unit completed");
    }

    /// True once every store stage completed the window's last segment.
    pub fn all_stages_finished(&self) -> bool {
        let last = self.segmenter.last_index();
        self.stages
            .iter()
            .filter(|s| s.kind() != ModuleKind::Map)
            .all(|s| self.get_state(Unit::new(last, s.idx())) == UnitState::Completed)
    }

    /// Blocks each store module already holds, keyed by module name.
    pub fn initial_progress(&self) -> BTreeMap<String, Range> {
        self.stages
            .iter()
            .flat_map(|s| s.module_states())
            .filter_map(|m| m.initial_range().map(|r| (m.name().to_string(), r)))
            .collect()
    }
}
