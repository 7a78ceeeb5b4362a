// src/worker/executor.rs

use async_trait::async_trait;

use crate::context::RunContext;
use crate::pool::Job;
use crate::stage::ScheduledUnit;

/// Computes module output for a block range.
///
/// Implementations write one partial store per store module, covering
/// exactly the requested range, before returning `Ok`. The orchestrator then
/// squashes those partials; it never looks at module output itself.
#[async_trait]
pub trait UnitExecutor: Send + Sync + 'static {
    /// Compute every module of a scheduled stage unit.
    async fn execute_unit(&self, ctx: &RunContext, unit: &ScheduledUnit) -> anyhow::Result<()>;

    /// Compute a single store module over the job's range.
    async fn execute_job(&self, ctx: &RunContext, job: &Job) -> anyhow::Result<()>;
}
