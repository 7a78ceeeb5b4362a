// src/engine/planner.rs

//! Turns the module graph into request-pool jobs.

use std::sync::Arc;

use tracing::debug;

use crate::block::BoundedRange;
use crate::graph::ModuleGraph;
use crate::pool::{Job, StoreWaiter};
use crate::store::StorageState;

/// A job ready to be added to the pool.
#[derive(Debug)]
pub struct PlannedJob {
    pub priority: u64,
    pub job: Job,
    pub waiter: Arc<StoreWaiter>,
}

/// One job per store module per segment chunk, from the module's last
/// checkpoint (or initial block) up to `stop_block`.
///
/// A chunk starting at block `b` waits for every upstream store to be merged
/// up to `b`, unless storage already holds that much. All jobs share one
/// priority, so ready jobs dispatch by start block and downstream modules
/// follow their inputs closely.
pub fn plan_jobs(
    graph: &ModuleGraph,
    storage_state: &StorageState,
    segment_interval: u64,
    stop_block: u64,
) -> Vec<PlannedJob> {
    let mut jobs = Vec::new();

    for module in graph.modules().filter(|m| m.is_store()) {
        let start = storage_state
            .last_block(&module.name)
            .unwrap_or(module.initial_block);
        if start >= stop_block {
            debug!(module = %module.name, start, "store already complete; nothing to plan");
            continue;
        }

        let upstream = graph.upstream_stores(&module.name);
        let bounded = BoundedRange::new(module.initial_block, segment_interval, start, stop_block);

        for chunk in bounded.iter() {
            let mut waiter = StoreWaiter::new(chunk.start_block);
            for up in &upstream {
                let available = storage_state.last_block(&up.name).unwrap_or(up.initial_block);
                if chunk.start_block > available {
                    waiter = waiter.depends_on(up.name.clone(), chunk.start_block);
                }
            }

            jobs.push(PlannedJob {
                priority: 0,
                job: Job::new(module.name.clone(), chunk),
                waiter: Arc::new(waiter),
            });
        }
    }

    debug!(jobs = jobs.len(), "planned pool jobs");
    jobs
}
