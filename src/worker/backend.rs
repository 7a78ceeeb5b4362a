// src/worker/backend.rs

//! Pluggable worker backend.
//!
//! The runtime hands scheduled units to a `WorkerBackend` instead of running
//! them itself. `ExecutorWorkerBackend` spawns one Tokio task per unit around
//! a [`UnitExecutor`]; tests can substitute a backend that records units
//! and answers with `RuntimeEvent`s directly.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::debug;

use crate::context::RunContext;
use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::stage::ScheduledUnit;
use crate::worker::UnitExecutor;
use crate::worker::unit_runner::run_unit;

pub trait WorkerBackend: Send {
    /// Start computing `units`. Completion is reported asynchronously as
    /// `RuntimeEvent::UnitCompleted`.
    fn dispatch_units(
        &mut self,
        units: Vec<ScheduledUnit>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production backend: every unit runs on its own Tokio task.
///
/// Units still running when the backend is dropped are aborted.
pub struct ExecutorWorkerBackend<E: UnitExecutor> {
    ctx: RunContext,
    executor: Arc<E>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    units: JoinSet<()>,
}

impl<E: UnitExecutor> ExecutorWorkerBackend<E> {
    pub fn new(ctx: RunContext, executor: Arc<E>, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            ctx,
            executor,
            runtime_tx,
            units: JoinSet::new(),
        }
    }
}

impl<E: UnitExecutor> WorkerBackend for ExecutorWorkerBackend<E> {
    fn dispatch_units(
        &mut self,
        units: Vec<ScheduledUnit>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            while self.units.try_join_next().is_some() {}

            for unit in units {
                debug!(parent: self.ctx.span(), unit = %unit.unit, "spawning unit");
                self.units.spawn(run_unit(
                    self.ctx.clone(),
                    Arc::clone(&self.executor),
                    unit,
                    self.runtime_tx.clone(),
                ));
            }
            Ok(())
        })
    }
}
