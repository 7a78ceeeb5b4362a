// src/engine/mod.rs

//! Orchestration engine.
//!
//! Two drivers share the block, stage and squasher layers:
//!
//! - The stage-driven driver: a pure state machine in [`core`] over
//!   [`crate::stage::Stages`] decides which units to dispatch and which
//!   merges to start; the async shell in [`runtime`] reads
//!   [`RuntimeEvent`]s from a channel, dispatches units through a
//!   [`crate::worker::WorkerBackend`] and runs merge tasks.
//! - The pool-driven driver in [`pool_runner`]: jobs produced by
//!   [`planner`] wait in a [`crate::pool::RequestPool`] until the stores they
//!   read are merged far enough; N consumers execute them and squash the
//!   results, and the squasher notifies the pool.

use crate::stage::{MergeMsg, Unit};

/// Outcome of a unit computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Success,
    Failed(String),
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Units allowed in flight at once.
    pub parallel_workers: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            parallel_workers: 1,
        }
    }
}

/// Events flowing into the runtime from workers and merge tasks.
#[derive(Debug)]
pub enum RuntimeEvent {
    /// A worker finished computing a unit.
    UnitCompleted { unit: Unit, outcome: UnitOutcome },
    /// A merge task resolved.
    MergeCompleted(MergeMsg),
    /// Graceful shutdown requested.
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod planner;
pub mod pool_runner;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep, WorkerSlots};
pub use planner::{PlannedJob, plan_jobs};
pub use pool_runner::PoolRunner;
pub use runtime::Runtime;
