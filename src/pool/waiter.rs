// src/pool/waiter.rs

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, Ordering};

/// Readiness descriptor attached to a queued job.
///
/// The pool calls [`Waiter::signal`] for every store progress notification
/// while the job is pending, then asks [`Waiter::is_ready`]. Ready jobs are
/// dispatched in ascending [`Waiter::order`].
pub trait Waiter: Send + Sync + Debug {
    fn signal(&self, store_name: &str, block: u64);

    fn is_ready(&self) -> bool;

    /// Ordering key, typically the first block the job may start at.
    fn order(&self) -> u64;
}

#[derive(Debug)]
struct StoreDependency {
    store_name: String,
    block: u64,
    satisfied: AtomicBool,
}

/// Waits until each named upstream store has been merged up to a block.
#[derive(Debug)]
pub struct StoreWaiter {
    order: u64,
    deps: Vec<StoreDependency>,
}

impl StoreWaiter {
    /// Waiter with no dependency; ready as soon as it is queued.
    pub fn new(order: u64) -> Self {
        Self {
            order,
            deps: Vec::new(),
        }
    }

    /// Waiter needing every store in `stores` to reach `block`, ordered by
    /// `block`.
    pub fn for_stores(block: u64, stores: &[&str]) -> Self {
        stores
            .iter()
            .fold(Self::new(block), |w, store| w.depends_on(*store, block))
    }

    pub fn depends_on(mut self, store_name: impl Into<String>, block: u64) -> Self {
        self.deps.push(StoreDependency {
            store_name: store_name.into(),
            block,
            satisfied: AtomicBool::new(false),
        });
        self
    }

    /// Dependencies not satisfied yet, as `(store, block)`.
    pub fn outstanding(&self) -> Vec<(&str, u64)> {
        self.deps
            .iter()
            .filter(|d| !d.satisfied.load(Ordering::Acquire))
            .map(|d| (d.store_name.as_str(), d.block))
            .collect()
    }
}

impl Waiter for StoreWaiter {
    fn signal(&self, store_name: &str, block: u64) {
        for dep in &self.deps {
            if dep.store_name == store_name && dep.block <= block {
                dep.satisfied.store(true, Ordering::Release);
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.deps.iter().all(|d| d.satisfied.load(Ordering::Acquire))
    }

    fn order(&self) -> u64 {
        self.order
    }
}

impl fmt::Display for StoreWaiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let deps: Vec<String> = self
            .deps
            .iter()
            .map(|d| format!("{}@{}", d.store_name, d.block))
            .collect();
        write!(f, "waiter(order={}, deps=[{}])", self.order, deps.join(", "))
    }
}
