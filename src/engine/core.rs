// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! The core consumes [`RuntimeEvent`]s and returns the commands the IO shell
//! should carry out. It holds no channels and performs no IO itself: merge
//! work is handed out as futures for the shell to run, so the core can be
//! driven step by step in tests.

use crate::engine::event_handlers::{
    CoreCommand, CoreStep, WorkerSlots, handle_merge_completion, handle_start,
    handle_unit_completion,
};
use crate::engine::{RuntimeEvent, RuntimeOptions};
use crate::errors::ContextError;
use crate::stage::Stages;
use crate::store::Store;

#[derive(Debug)]
pub struct CoreRuntime<S: Store> {
    stages: Stages<S>,
    slots: WorkerSlots,
}

impl<S: Store> CoreRuntime<S> {
    pub fn new(stages: Stages<S>, options: RuntimeOptions) -> Self {
        Self {
            stages,
            slots: WorkerSlots::new(options.parallel_workers),
        }
    }

    pub fn stages(&self) -> &Stages<S> {
        &self.stages
    }

    /// Units currently handed to workers (for tests).
    pub fn units_in_flight(&self) -> usize {
        self.slots.in_use()
    }

    /// First step of a run, before any event arrived.
    pub fn start(&mut self) -> CoreStep {
        handle_start(&mut self.stages, &mut self.slots)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::UnitCompleted { unit, outcome } => {
                handle_unit_completion(&mut self.stages, &mut self.slots, unit, outcome)
            }
            RuntimeEvent::MergeCompleted(msg) => {
                handle_merge_completion(&mut self.stages, &mut self.slots, msg)
            }
            RuntimeEvent::ShutdownRequested => CoreStep {
                commands: vec![CoreCommand::Abort(ContextError::Canceled.into())],
                keep_running: false,
            },
        }
    }
}
