// src/pool/mod.rs

//! Priority dispatch queue of jobs gated by upstream store progress.
//!
//! Producers [`RequestPool::add`] jobs together with a [`Waiter`]; store
//! progress arrives through [`RequestPool::notify`] (the pool is a
//! [`Notifier`], so a squasher can drive it directly); consumers block in
//! [`RequestPool::get_next`] until a job is ready, the context is done, or
//! the pool is exhausted.

mod job;
mod waiter;

pub use job::Job;
pub use waiter::{StoreWaiter, Waiter};

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{Span, debug, trace};

use crate::context::RunContext;
use crate::errors::PoolError;
use crate::store::Notifier;

struct PendingJob {
    seq: u64,
    priority: u64,
    job: Job,
    waiter: Arc<dyn Waiter>,
}

/// Ready jobs compare by `(priority, waiter order, insertion sequence)`.
struct ReadyJob {
    key: (u64, u64, u64),
    job: Job,
}

impl PartialEq for ReadyJob {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ReadyJob {}

impl PartialOrd for ReadyJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReadyJob {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

#[derive(Default)]
struct PoolState {
    pending: Vec<PendingJob>,
    ready: BinaryHeap<Reverse<ReadyJob>>,
    started: bool,
    next_seq: u64,
}

impl PoolState {
    fn push_ready(&mut self, pending: PendingJob) {
        let key = (pending.priority, pending.waiter.order(), pending.seq);
        self.ready.push(Reverse(ReadyJob {
            key,
            job: pending.job,
        }));
    }
}

pub struct RequestPool {
    state: Mutex<PoolState>,
    changed: Notify,
    span: Span,
}

impl fmt::Debug for RequestPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RequestPool")
            .field("pending", &state.pending.len())
            .field("ready", &state.ready.len())
            .field("started", &state.started)
            .finish()
    }
}

impl RequestPool {
    pub fn new(ctx: &RunContext) -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
            changed: Notify::new(),
            span: tracing::info_span!(parent: ctx.span(), "request_pool"),
        }
    }

    /// Queue `job`. It is ready at once when `waiter` has nothing outstanding.
    ///
    /// Fails with [`PoolError::Closed`] once [`RequestPool::start`] was called.
    pub fn add(&self, priority: u64, job: Job, waiter: Arc<dyn Waiter>) -> Result<(), PoolError> {
        let ready = {
            let mut state = self.state.lock();
            if state.started {
                return Err(PoolError::Closed);
            }

            let seq = state.next_seq;
            state.next_seq += 1;

            let pending = PendingJob {
                seq,
                priority,
                job,
                waiter,
            };

            debug!(
                parent: &self.span,
                job = %pending.job,
                order = pending.waiter.order(),
                "adding job"
            );

            if pending.waiter.is_ready() {
                state.push_ready(pending);
                true
            } else {
                state.pending.push(pending);
                false
            }
        };

        if ready {
            self.changed.notify_waiters();
        }
        Ok(())
    }

    /// Declare that no more jobs will be added. Once every job has been
    /// handed out, [`RequestPool::get_next`] reports exhaustion.
    pub fn start(&self) {
        self.state.lock().started = true;
        debug!(parent: &self.span, "request pool started");
        self.changed.notify_waiters();
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn ready_len(&self) -> usize {
        self.state.lock().ready.len()
    }

    /// Signal every pending waiter that `store_name` reached `block`; jobs
    /// whose dependencies are now all satisfied move to the ready set.
    pub fn notify(&self, store_name: &str, block: u64) {
        let promoted = {
            let mut state = self.state.lock();
            let pending = std::mem::take(&mut state.pending);
            let mut promoted = 0usize;

            for job in pending {
                job.waiter.signal(store_name, block);
                if job.waiter.is_ready() {
                    trace!(
                        parent: &self.span,
                        job = %job.job,
                        store = store_name,
                        block,
                        "job ready"
                    );
                    state.push_ready(job);
                    promoted += 1;
                } else {
                    state.pending.push(job);
                }
            }
            promoted
        };

        if promoted > 0 {
            debug!(parent: &self.span, store = store_name, block, promoted, "jobs became ready");
            self.changed.notify_waiters();
        }
    }

    /// Next ready job, waiting for one when none is ready.
    ///
    /// Returns the context's error if it is done first (nothing is consumed
    /// in that case) and [`PoolError::Exhausted`] once the pool is started
    /// and holds no pending or ready job.
    pub async fn get_next(&self, ctx: &RunContext) -> Result<Job, PoolError> {
        loop {
            // Register interest before inspecting the state so a notification
            // landing in between is not lost.
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(Reverse(ready)) = state.ready.pop() {
                    trace!(parent: &self.span, job = %ready.job, "dispatching job");
                    return Ok(ready.job);
                }
                if state.started && state.pending.is_empty() {
                    return Err(PoolError::Exhausted);
                }
            }

            tokio::select! {
                _ = &mut notified => {}
                err = ctx.done() => return Err(err.into()),
            }
        }
    }
}

impl Notifier for RequestPool {
    fn notify(&self, store_name: &str, block: u64) {
        RequestPool::notify(self, store_name, block);
    }
}
