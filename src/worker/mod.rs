// src/worker/mod.rs

//! Execution layer: where module output actually gets computed.
//!
//! - [`executor`] defines the [`UnitExecutor`] the embedding application
//!   implements.
//! - [`unit_runner`] runs one unit and reports back to the runtime.
//! - [`backend`] provides the `WorkerBackend` trait the runtime dispatches
//!   through, and the Tokio-based production implementation.

pub mod backend;
pub mod executor;
pub mod unit_runner;

pub use backend::{ExecutorWorkerBackend, WorkerBackend};
pub use executor::UnitExecutor;
