// src/lib.rs

pub mod block;
pub mod config;
pub mod context;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod logging;
pub mod pool;
pub mod squasher;
pub mod stage;
pub mod store;
pub mod types;
pub mod worker;

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::block::Segmenter;
use crate::config::ConfigFile;
use crate::context::RunContext;
use crate::engine::{CoreRuntime, PoolRunner, Runtime, RuntimeEvent, RuntimeOptions, plan_jobs};
use crate::errors::{OrchestratorError, Result};
use crate::graph::ModuleGraph;
use crate::pool::RequestPool;
use crate::squasher::Squasher;
use crate::stage::Stages;
use crate::store::{SnapshotLister, StorageState, Store, StoreConfig};
use crate::types::OrchestrationMode;
use crate::worker::{ExecutorWorkerBackend, UnitExecutor};

/// Build every store module of `cfg` up to `[orchestrator].stop_block` and
/// return the completed stores keyed by module name.
///
/// This wires together:
/// - the module graph and the checkpoints found through `lister`
/// - the squasher, seeded from those checkpoints
/// - the stage-driven runtime or the request pool, per `[orchestrator].mode`
/// - `executor`, which computes the partial stores
///
/// `stores` holds one empty handle per store module.
pub async fn orchestrate<S, E>(
    ctx: &RunContext,
    cfg: &ConfigFile,
    stores: Vec<S>,
    lister: &dyn SnapshotLister,
    executor: Arc<E>,
) -> Result<BTreeMap<String, S>>
where
    S: Store,
    E: UnitExecutor,
{
    let orch = &cfg.orchestrator;
    let graph = ModuleGraph::from_config(cfg);
    let store_configs = graph.store_configs();
    check_store_handles(&store_configs, &stores)?;

    let configs: Vec<StoreConfig> = store_configs.values().cloned().collect();
    let storage_state = StorageState::fetch(
        ctx,
        lister,
        &configs,
        orch.effective_store_save_interval(),
        orch.stop_block,
    )
    .await?;

    info!(
        parent: ctx.span(),
        mode = ?orch.mode,
        stores = configs.len(),
        stop_block = orch.stop_block,
        "starting orchestration"
    );

    let squasher = Squasher::new(
        ctx,
        &storage_state,
        stores,
        orch.effective_store_save_interval(),
        orch.stop_block,
    )
    .await?;

    let squasher = match orch.mode {
        OrchestrationMode::Stages => {
            let squasher = Arc::new(squasher);
            let segmenter = Segmenter::new(
                orch.segment_interval,
                graph.lowest_initial_block(),
                orch.stop_block,
            );
            let stages = Stages::new(
                ctx,
                &graph.staged_modules()?,
                segmenter,
                &store_configs,
                &storage_state,
                Arc::clone(&squasher),
            );
            let core = CoreRuntime::new(
                stages,
                RuntimeOptions {
                    parallel_workers: orch.parallel_workers,
                },
            );

            let (event_tx, event_rx) = mpsc::channel::<RuntimeEvent>(64);
            let worker = ExecutorWorkerBackend::new(ctx.clone(), executor, event_tx.clone());
            Runtime::new(ctx.clone(), core, event_tx, event_rx, worker)
                .run()
                .await?;
            squasher
        }
        OrchestrationMode::Pool => {
            let pool = Arc::new(RequestPool::new(ctx));
            let squasher = Arc::new(squasher.with_notifier(pool.clone()));

            let planned_jobs =
                plan_jobs(&graph, &storage_state, orch.segment_interval, orch.stop_block);
            for planned in planned_jobs {
                pool.add(planned.priority, planned.job, planned.waiter)?;
            }
            pool.start();

            PoolRunner::new(
                ctx.clone(),
                pool,
                Arc::clone(&squasher),
                executor,
                orch.parallel_workers,
            )
            .run()
            .await?;
            squasher
        }
    };

    let stores = squasher.stores_ready().await?;
    info!(parent: ctx.span(), stores = stores.len(), "orchestration complete");
    Ok(stores)
}

fn check_store_handles<S: Store>(
    configs: &BTreeMap<String, StoreConfig>,
    stores: &[S],
) -> Result<()> {
    for name in configs.keys() {
        if !stores.iter().any(|s| s.name() == name) {
            return Err(OrchestratorError::ModuleNotFound(format!(
                "no store handle for store module '{name}'"
            )));
        }
    }
    if let Some(extra) = stores.iter().find(|s| !configs.contains_key(s.name())) {
        return Err(OrchestratorError::ModuleNotFound(format!(
            "store handle '{}' matches no store module",
            extra.name()
        )));
    }
    Ok(())
}
