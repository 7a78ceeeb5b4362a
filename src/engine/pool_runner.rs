// src/engine/pool_runner.rs

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::errors::{OrchestratorError, PoolError, Result};
use crate::pool::RequestPool;
use crate::squasher::Squasher;
use crate::store::Store;
use crate::worker::UnitExecutor;

/// Pool-driven driver: `parallel_workers` consumers pull ready jobs, execute
/// them and squash the produced partials.
///
/// The squasher must notify `pool`, otherwise jobs waiting on upstream
/// stores never become ready.
pub struct PoolRunner<S: Store, E: UnitExecutor> {
    ctx: RunContext,
    pool: Arc<RequestPool>,
    squasher: Arc<Squasher<S>>,
    executor: Arc<E>,
    parallel_workers: usize,
}

impl<S: Store, E: UnitExecutor> PoolRunner<S, E> {
    pub fn new(
        ctx: RunContext,
        pool: Arc<RequestPool>,
        squasher: Arc<Squasher<S>>,
        executor: Arc<E>,
        parallel_workers: usize,
    ) -> Self {
        Self {
            ctx,
            pool,
            squasher,
            executor,
            parallel_workers: parallel_workers.max(1),
        }
    }

    /// Run until the pool is exhausted. The first failing job or squash
    /// stops the other consumers.
    pub async fn run(self) -> Result<()> {
        info!(parent: self.ctx.span(), workers = self.parallel_workers, "pool runner started");

        let mut consumers = JoinSet::new();
        for worker_id in 0..self.parallel_workers {
            consumers.spawn(consume(
                worker_id,
                self.ctx.clone(),
                Arc::clone(&self.pool),
                Arc::clone(&self.squasher),
                Arc::clone(&self.executor),
            ));
        }

        while let Some(joined) = consumers.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(join_err) => Err(OrchestratorError::Other(anyhow::anyhow!(
                    "pool consumer task failed: {join_err}"
                ))),
            };
            if let Err(err) = outcome {
                warn!(parent: self.ctx.span(), error = %err, "stopping pool consumers");
                consumers.abort_all();
                return Err(err);
            }
        }

        info!(parent: self.ctx.span(), "pool exhausted");
        Ok(())
    }
}

async fn consume<S: Store, E: UnitExecutor>(
    worker_id: usize,
    ctx: RunContext,
    pool: Arc<RequestPool>,
    squasher: Arc<Squasher<S>>,
    executor: Arc<E>,
) -> Result<()> {
    loop {
        let job = match pool.get_next(&ctx).await {
            Ok(job) => job,
            Err(PoolError::Exhausted) => {
                debug!(parent: ctx.span(), worker_id, "no more jobs");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        debug!(parent: ctx.span(), worker_id, %job, "executing job");
        executor
            .execute_job(&ctx, &job)
            .await
            .map_err(|err| OrchestratorError::PoolJobFailed {
                job: job.to_string(),
                message: format!("{err:#}"),
            })?;

        squasher.squash(job.module_name(), job.range()).await?;
    }
}
