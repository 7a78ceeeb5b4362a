use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use blockorch::block::Range;
use blockorch::context::RunContext;
use blockorch::engine::{RuntimeEvent, UnitOutcome};
use blockorch::errors::Result;
use blockorch::pool::Job;
use blockorch::stage::{ScheduledUnit, Unit};
use blockorch::store::{MemoryBackend, Notifier, Store, StoreConfig};
use blockorch::worker::{UnitExecutor, WorkerBackend};

/// Key holding the range of the last partial merged into a store.
pub const LAST_RANGE_KEY: &str = "last_range";

/// Key under which the partial for a range starting at `start_block` is stored.
pub fn block_key(start_block: u64) -> String {
    format!("block:{start_block:010}")
}

/// Executor writing deterministic partial stores into a [`MemoryBackend`].
///
/// Each partial holds [`block_key`] for its start block and
/// [`LAST_RANGE_KEY`], both set to the range as text.
#[derive(Clone)]
pub struct MemoryExecutor {
    backend: MemoryBackend,
    configs: BTreeMap<String, StoreConfig>,
    executed: Arc<Mutex<Vec<String>>>,
    fail_module: Option<String>,
    delay: Option<Duration>,
}

impl MemoryExecutor {
    pub fn new(backend: MemoryBackend, configs: impl IntoIterator<Item = StoreConfig>) -> Self {
        Self {
            backend,
            configs: configs
                .into_iter()
                .map(|c| (c.name().to_string(), c))
                .collect(),
            executed: Arc::new(Mutex::new(Vec::new())),
            fail_module: None,
            delay: None,
        }
    }

    /// Fail every computation touching `module`.
    pub fn failing_on(mut self, module: &str) -> Self {
        self.fail_module = Some(module.to_string());
        self
    }

    /// Sleep before writing each partial.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Units and jobs executed so far, in completion order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub async fn write_partial(&self, module: &str, range: Range) -> anyhow::Result<()> {
        if self.fail_module.as_deref() == Some(module) {
            anyhow::bail!("injected failure for module {module}");
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let config = self
            .configs
            .get(module)
            .ok_or_else(|| anyhow::anyhow!("no store config for {module}"))?;

        let mut partial = self
            .backend
            .store(config.clone())
            .clone_structure(range.start_block);
        partial.set(block_key(range.start_block), range.to_string())?;
        partial.set(LAST_RANGE_KEY, range.to_string())?;
        partial.write_state(range.exclusive_end_block).await?;
        Ok(())
    }
}

#[async_trait]
impl UnitExecutor for MemoryExecutor {
    async fn execute_unit(&self, _ctx: &RunContext, unit: &ScheduledUnit) -> anyhow::Result<()> {
        for (module, range) in unit.store_modules() {
            self.write_partial(module, range).await?;
        }
        self.executed.lock().unwrap().push(unit.unit.to_string());
        Ok(())
    }

    async fn execute_job(&self, _ctx: &RunContext, job: &Job) -> anyhow::Result<()> {
        self.write_partial(job.module_name(), job.range()).await?;
        self.executed.lock().unwrap().push(job.to_string());
        Ok(())
    }
}

/// Notifier recording every `(store, block)` it is told about.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(String, u64)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, u64)> {
        self.events.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, store_name: &str, block: u64) {
        self.events
            .lock()
            .unwrap()
            .push((store_name.to_string(), block));
    }
}

/// A fake worker backend that:
/// - records which units were dispatched
/// - runs them inline through a [`MemoryExecutor`]
/// - immediately reports `UnitCompleted` for each of them.
pub struct FakeWorkerBackend {
    executor: MemoryExecutor,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    dispatched: Arc<Mutex<Vec<Unit>>>,
}

impl FakeWorkerBackend {
    pub fn new(
        executor: MemoryExecutor,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        dispatched: Arc<Mutex<Vec<Unit>>>,
    ) -> Self {
        Self {
            executor,
            runtime_tx,
            dispatched,
        }
    }
}

impl WorkerBackend for FakeWorkerBackend {
    fn dispatch_units(
        &mut self,
        units: Vec<ScheduledUnit>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executor = self.executor.clone();
        let dispatched = Arc::clone(&self.dispatched);

        Box::pin(async move {
            let ctx = RunContext::background();
            for unit in units {
                dispatched.lock().unwrap().push(unit.unit);

                let outcome = match executor.execute_unit(&ctx, &unit).await {
                    Ok(()) => UnitOutcome::Success,
                    Err(err) => UnitOutcome::Failed(format!("{err:#}")),
                };

                tx.send(RuntimeEvent::UnitCompleted {
                    unit: unit.unit,
                    outcome,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}
