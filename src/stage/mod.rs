// src/stage/mod.rs

//! Stage-driven scheduling of `(segment, stage)` units.

mod module_state;
mod scheduled;
#[allow(clippy::module_inception)]
mod stage;
mod stages;
mod unit;

pub use module_state::ModuleState;
pub use scheduled::{ScheduledModule, ScheduledUnit};
pub use stage::{Stage, stage_kind};
pub use stages::{MergeCommand, MergeMsg, MergeTask, Stages};
pub use unit::{Unit, UnitState};
