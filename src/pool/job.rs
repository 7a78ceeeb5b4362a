// src/pool/job.rs

use std::fmt;

use crate::block::Range;

/// A unit of work for one module over one block range.
///
/// Jobs are immutable once queued; readiness lives in the job's waiter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Job {
    module_name: String,
    range: Range,
}

impl Job {
    pub fn new(module_name: impl Into<String>, range: Range) -> Self {
        Self {
            module_name: module_name.into(),
            range,
        }
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn range(&self) -> Range {
        self.range
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.module_name, self.range)
    }
}
