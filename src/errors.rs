// src/errors.rs

//! Crate-wide error types and aliases.

use thiserror::Error;

use crate::block::Range;
use crate::stage::Unit;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Cycle detected in module graph: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("job for unit {unit} failed: {message}")]
    JobFailed { unit: Unit, message: String },

    #[error("job {job} failed: {message}")]
    PoolJobFailed { job: String, message: String },

    #[error("merge of unit {unit} failed: {source}")]
    MergeFailed {
        unit: Unit,
        #[source]
        source: SquashError,
    },

    #[error(transparent)]
    Squash(#[from] SquashError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Why a [`crate::context::RunContext`] is done.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Failures reported by a store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store {store:?}: no snapshot found for range {range}")]
    NotFound { store: String, range: Range },

    #[error("store {store:?}: {message}")]
    LimitExceeded { store: String, message: String },

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failures of the squasher. Every variant except `Context` and `NotReady`
/// aborts the owning merge.
#[derive(Error, Debug)]
pub enum SquashError {
    #[error("module {0:?} was not found in squashables module registry")]
    UnknownModule(String),

    #[error(
        "module {module:?}: received a squash request for a start block {start_block} prior to the module's initial block {initial_block}"
    )]
    BeforeInitialBlock {
        module: String,
        start_block: u64,
        initial_block: u64,
    },

    #[error("module {module:?}: range {range} overlaps pending range {existing}")]
    OverlappingRange {
        module: String,
        range: Range,
        existing: Range,
    },

    #[error(
        "module {module:?}: non contiguous ranges were added to the store squasher, expected {expected}, got {got}, ranges: {ranges}"
    )]
    NonContiguous {
        module: String,
        expected: u64,
        got: u64,
        ranges: String,
    },

    #[error("loading store {module:?}: range {range}: {source}")]
    Load {
        module: String,
        range: Range,
        #[source]
        source: StoreError,
    },

    #[error("merging partial {range} into store {module:?}: {source}")]
    Merge {
        module: String,
        range: Range,
        #[source]
        source: StoreError,
    },

    #[error("writing state of store {module:?} at block {block}: {source}")]
    WriteState {
        module: String,
        block: u64,
        #[source]
        source: StoreError,
    },

    #[error("stores not ready: {0}")]
    NotReady(String),

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Outcomes of [`crate::pool::RequestPool::get_next`] other than a job.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("context canceled")]
    Canceled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
    /// No job is pending or ready and none will be added.
    #[error("request pool exhausted")]
    Exhausted,
    #[error("request pool already started; no more jobs can be added")]
    Closed,
}

impl From<ContextError> for PoolError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Canceled => PoolError::Canceled,
            ContextError::DeadlineExceeded => PoolError::DeadlineExceeded,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, OrchestratorError>;
