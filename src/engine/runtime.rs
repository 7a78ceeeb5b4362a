// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::errors::Result;
use crate::stage::{MergeTask, ScheduledUnit, Unit};
use crate::store::Store;
use crate::worker::WorkerBackend;

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Drives [`CoreRuntime`] in response to `RuntimeEvent`s.
///
/// This is the IO shell: it reads events from the channel, hands units to
/// the `WorkerBackend` and runs merge tasks on Tokio, feeding their results
/// back into the same channel.
///
/// Merge tasks are owned by the runtime: when `run` returns, merges still in
/// flight are aborted together with the worker backend's units.
pub struct Runtime<S: Store, W: WorkerBackend> {
    ctx: RunContext,
    core: CoreRuntime<S>,
    event_tx: mpsc::Sender<RuntimeEvent>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    worker: W,
    merges: JoinSet<()>,
}

impl<S: Store, W: WorkerBackend> fmt::Debug for Runtime<S, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<S: Store, W: WorkerBackend> Runtime<S, W> {
    /// `event_tx` must feed `event_rx`; merge results are sent through it.
    pub fn new(
        ctx: RunContext,
        core: CoreRuntime<S>,
        event_tx: mpsc::Sender<RuntimeEvent>,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        worker: W,
    ) -> Self {
        Self {
            ctx,
            core,
            event_tx,
            event_rx,
            worker,
            merges: JoinSet::new(),
        }
    }

    /// Main event loop. Returns once every store is complete, or with the
    /// first unit or merge failure, or when the run context is done.
    pub async fn run(mut self) -> Result<()> {
        info!(parent: self.ctx.span(), "orchestration runtime started");

        let step = self.core.start();
        let mut keep_running = step.keep_running;
        for command in step.commands {
            self.execute_command(command).await?;
        }

        while keep_running {
            let event = tokio::select! {
                event = self.event_rx.recv() => match event {
                    Some(e) => e,
                    None => {
                        info!(parent: self.ctx.span(), "runtime event channel closed; exiting");
                        break;
                    }
                },
                err = self.ctx.done() => {
                    warn!(parent: self.ctx.span(), %err, "run context done; stopping runtime");
                    return Err(err.into());
                }
            };

            debug!(parent: self.ctx.span(), ?event, "runtime received event");

            let step = self.core.step(event);
            keep_running = step.keep_running;

            for command in step.commands {
                self.execute_command(command).await?;
            }
        }

        info!(parent: self.ctx.span(), "runtime exiting");
        Ok(())
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchUnits(units) => self.dispatch(units).await?,
            CoreCommand::RunMerge { unit, task } => self.spawn_merge(unit, task),
            CoreCommand::Finish => info!(parent: self.ctx.span(), "all stores completed"),
            CoreCommand::Abort(err) => return Err(err),
        }
        Ok(())
    }

    async fn dispatch(&mut self, units: Vec<ScheduledUnit>) -> Result<()> {
        if units.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = units.iter().map(|u| u.unit.to_string()).collect();
        debug!(parent: self.ctx.span(), ?ids, "dispatching units");

        self.worker.dispatch_units(units).await
    }

    fn spawn_merge(&mut self, unit: Unit, task: MergeTask) {
        // Reap finished merges so the set only holds live tasks.
        while self.merges.try_join_next().is_some() {}

        debug!(parent: self.ctx.span(), %unit, "spawning merge");
        let tx = self.event_tx.clone();
        let span = self.ctx.span().clone();
        self.merges.spawn(async move {
            let msg = task.await;
            if tx.send(RuntimeEvent::MergeCompleted(msg)).await.is_err() {
                debug!(parent: &span, %unit, "runtime gone; dropping merge result");
            }
        });
    }
}
