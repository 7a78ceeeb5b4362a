// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::fmt;

use tracing::{debug, warn};

use crate::errors::OrchestratorError;
use crate::stage::{MergeCommand, MergeMsg, MergeTask, ScheduledUnit, Stages, Unit};
use crate::store::Store;

use super::UnitOutcome;

/// Command produced by the pure core, to be executed by the outer IO shell.
pub enum CoreCommand {
    /// Send these units to the worker backend.
    DispatchUnits(Vec<ScheduledUnit>),
    /// Run this merge off the scheduling loop and report back.
    RunMerge { unit: Unit, task: MergeTask },
    /// Every store is complete.
    Finish,
    /// Stop with this error.
    Abort(OrchestratorError),
}

impl fmt::Debug for CoreCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreCommand::DispatchUnits(units) => {
                f.debug_tuple("DispatchUnits").field(units).finish()
            }
            CoreCommand::RunMerge { unit, .. } => f
                .debug_struct("RunMerge")
                .field("unit", unit)
                .finish_non_exhaustive(),
            CoreCommand::Finish => f.write_str("Finish"),
            CoreCommand::Abort(err) => f.debug_tuple("Abort").field(err).finish(),
        }
    }
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    fn stop(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: false,
        }
    }
}

/// Bounded count of units in flight.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSlots {
    capacity: usize,
    in_use: usize,
}

impl WorkerSlots {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            in_use: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_use(&self) -> usize {
        self.in_use
    }

    pub fn has_free(&self) -> bool {
        self.in_use < self.capacity
    }

    fn acquire(&mut self) {
        self.in_use += 1;
    }

    fn release(&mut self) {
        self.in_use = self.in_use.saturating_sub(1);
    }
}

/// Fill free worker slots with runnable units.
pub fn schedule_units<S: Store>(
    stages: &mut Stages<S>,
    slots: &mut WorkerSlots,
) -> Vec<CoreCommand> {
    let mut units = Vec::new();

    while slots.has_free() {
        let Some((unit, range)) = stages.next_job() else {
            break;
        };
        match stages.scheduled_unit(unit, range) {
            Some(scheduled) => {
                slots.acquire();
                units.push(scheduled);
            }
            None => warn!(%unit, "scheduled unit has no stage"),
        }
    }

    if units.is_empty() {
        Vec::new()
    } else {
        vec![CoreCommand::DispatchUnits(units)]
    }
}

/// Translate merge commands. Returns whether the stores completed.
fn push_merges(merges: Vec<MergeCommand>, commands: &mut Vec<CoreCommand>) -> bool {
    let mut completed = false;
    for merge in merges {
        match merge {
            MergeCommand::Merge { unit, task } => {
                commands.push(CoreCommand::RunMerge { unit, task })
            }
            MergeCommand::StoresCompleted => completed = true,
        }
    }
    completed
}

/// Initial step: dispatch what can run and start any merge already possible
/// (for instance when every store was restored from checkpoints).
pub fn handle_start<S: Store>(stages: &mut Stages<S>, slots: &mut WorkerSlots) -> CoreStep {
    let mut commands = Vec::new();

    if push_merges(stages.cmd_start_merge(), &mut commands) {
        commands.push(CoreCommand::Finish);
        return CoreStep::stop(commands);
    }

    commands.extend(schedule_units(stages, slots));
    CoreStep::running(commands)
}

/// A worker finished a unit: record the partial, try to merge it, and refill
/// the freed slot.
pub fn handle_unit_completion<S: Store>(
    stages: &mut Stages<S>,
    slots: &mut WorkerSlots,
    unit: Unit,
    outcome: UnitOutcome,
) -> CoreStep {
    slots.release();

    if let UnitOutcome::Failed(message) = outcome {
        return CoreStep::stop(vec![CoreCommand::Abort(OrchestratorError::JobFailed {
            unit,
            message,
        })]);
    }

    debug!(%unit, "partials present");
    stages.mark_partial_present(unit);

    let mut commands = Vec::new();
    let merges: Vec<MergeCommand> = stages.cmd_merge(unit.stage).into_iter().collect();
    if push_merges(merges, &mut commands) {
        commands.push(CoreCommand::Finish);
        return CoreStep::stop(commands);
    }

    commands.extend(schedule_units(stages, slots));
    CoreStep::running(commands)
}

/// A merge task resolved: on success the next segment of the stage may
/// merge, and downstream units may have become runnable.
pub fn handle_merge_completion<S: Store>(
    stages: &mut Stages<S>,
    slots: &mut WorkerSlots,
    msg: MergeMsg,
) -> CoreStep {
    let unit = match msg {
        MergeMsg::Finished { unit } => unit,
        MergeMsg::Failed { unit, error } => {
            return CoreStep::stop(vec![CoreCommand::Abort(OrchestratorError::MergeFailed {
                unit,
                source: error,
            })]);
        }
    };

    stages.merge_completed(unit);

    let mut commands = Vec::new();
    let merges: Vec<MergeCommand> = stages.cmd_merge(unit.stage).into_iter().collect();
    if push_merges(merges, &mut commands) {
        commands.push(CoreCommand::Finish);
        return CoreStep::stop(commands);
    }

    commands.extend(schedule_units(stages, slots));
    CoreStep::running(commands)
}
