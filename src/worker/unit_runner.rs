// src/worker/unit_runner.rs

//! Runs one scheduled unit and reports its outcome to the runtime.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::context::RunContext;
use crate::engine::{RuntimeEvent, UnitOutcome};
use crate::stage::ScheduledUnit;
use crate::worker::UnitExecutor;

/// Execute `unit` and send a `UnitCompleted` event.
///
/// Nothing is sent when the context is done before the executor returns;
/// the runtime is shutting down in that case.
pub async fn run_unit<E: UnitExecutor>(
    ctx: RunContext,
    executor: Arc<E>,
    unit: ScheduledUnit,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    info!(
        parent: ctx.span(),
        unit = %unit.unit,
        range = %unit.range,
        modules = unit.modules.len(),
        "executing unit"
    );

    let outcome = tokio::select! {
        res = executor.execute_unit(&ctx, &unit) => match res {
            Ok(()) => UnitOutcome::Success,
            Err(err) => {
                error!(
                    parent: ctx.span(),
                    unit = %unit.unit,
                    error = %format!("{err:#}"),
                    "unit execution failed"
                );
                UnitOutcome::Failed(format!("{err:#}"))
            }
        },
        err = ctx.done() => {
            debug!(parent: ctx.span(), unit = %unit.unit, %err, "unit abandoned");
            return;
        }
    };

    if runtime_tx
        .send(RuntimeEvent::UnitCompleted {
            unit: unit.unit,
            outcome,
        })
        .await
        .is_err()
    {
        debug!(parent: ctx.span(), unit = %unit.unit, "runtime gone; dropping unit outcome");
    }
}
