// src/stage/scheduled.rs

use crate::block::Range;
use crate::stage::unit::Unit;
use crate::types::ModuleKind;

/// One module's share of a scheduled unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledModule {
    pub name: String,
    pub kind: ModuleKind,
    /// The module's own slice of the segment; `None` while the module has
    /// not reached its initial block.
    pub range: Option<Range>,
}

/// A unit handed to a worker, with everything needed to compute it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledUnit {
    pub unit: Unit,
    pub range: Range,
    pub modules: Vec<ScheduledModule>,
}

impl ScheduledUnit {
    pub fn new(unit: Unit, range: Range, modules: Vec<ScheduledModule>) -> Self {
        Self {
            unit,
            range,
            modules,
        }
    }

    /// Store modules that produce a partial for this unit.
    pub fn store_modules(&self) -> impl Iterator<Item = (&str, Range)> {
        self.modules.iter().filter_map(|m| match (m.kind, m.range) {
            (ModuleKind::Store, Some(range)) => Some((m.name.as_str(), range)),
            _ => None,
        })
    }
}
