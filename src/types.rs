use std::str::FromStr;
use serde::Deserialize;

/// Kind of a module in the graph.
///
/// - `Map`: stateless transform; its output for a block depends only on that
///   block (and on the stores it reads).
/// - `Store`: accumulates key-value state block after block; partial results
///   computed in parallel must be merged in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Map,
    Store,
}

impl FromStr for ModuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "map" => Ok(ModuleKind::Map),
            "store" => Ok(ModuleKind::Store),
            other => Err(format!(
                "invalid module kind: {other} (expected \"map\" or \"store\")"
            )),
        }
    }
}

/// How a partial store's entries are folded into the full store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Later values replace earlier ones.
    Set,
    /// The first value written for a key wins.
    SetIfNotExists,
    /// Later values are appended to earlier ones.
    Append,
}

impl Default for UpdatePolicy {
    fn default() -> Self {
        UpdatePolicy::Set
    }
}

impl FromStr for UpdatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "set" => Ok(UpdatePolicy::Set),
            "set_if_not_exists" => Ok(UpdatePolicy::SetIfNotExists),
            "append" => Ok(UpdatePolicy::Append),
            other => Err(format!(
                "invalid update_policy: {other} (expected \"set\", \"set_if_not_exists\" or \"append\")"
            )),
        }
    }
}

/// Which driver runs the orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrchestrationMode {
    /// Segment-by-segment, stage-by-stage scheduling through `Stages`.
    Stages,
    /// Per-module jobs dispatched through the `RequestPool`.
    Pool,
}

impl Default for OrchestrationMode {
    fn default() -> Self {
        OrchestrationMode::Stages
    }
}

/// Log verbosity accepted by [`crate::logging::init_logging`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("invalid log level: {other}")),
        }
    }
}
