// src/stage/unit.rs

use std::fmt;

/// A `(segment, stage)` pair: the atomic schedulable and mergeable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Unit {
    pub segment: usize,
    pub stage: usize,
}

impl Unit {
    pub fn new(segment: usize, stage: usize) -> Self {
        Self { segment, stage }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment {} stage {}", self.segment, self.stage)
    }
}

/// Progress of a unit. States only ever move forward, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum UnitState {
    /// Not handed out yet.
    #[default]
    Pending,
    /// Handed to a worker.
    Scheduled,
    /// The worker produced the partial stores for the unit.
    PartialPresent,
    /// Partials are being squashed into the full stores.
    Merging,
    /// Partials merged; downstream stages may rely on the stores.
    Completed,
}
