// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{OrchestratorError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = OrchestratorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.orchestrator, raw.module))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_modules(cfg)?;
    validate_orchestrator(cfg)?;
    validate_module_inputs(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_modules(cfg: &RawConfigFile) -> Result<()> {
    if cfg.module.is_empty() {
        return Err(OrchestratorError::ConfigError(
            "config must contain at least one [module.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_orchestrator(cfg: &RawConfigFile) -> Result<()> {
    let orch = &cfg.orchestrator;

    if orch.segment_interval == 0 {
        return Err(OrchestratorError::ConfigError(
            "[orchestrator].segment_interval must be >= 1 (got 0)".to_string(),
        ));
    }

    let save_interval = orch.effective_store_save_interval();
    if save_interval == 0 {
        return Err(OrchestratorError::ConfigError(
            "[orchestrator].store_save_interval must be >= 1 (got 0)".to_string(),
        ));
    }
    if save_interval % orch.segment_interval != 0 {
        return Err(OrchestratorError::ConfigError(format!(
            "[orchestrator].store_save_interval ({}) must be a multiple of segment_interval ({})",
            save_interval, orch.segment_interval
        )));
    }

    if orch.parallel_workers == 0 {
        return Err(OrchestratorError::ConfigError(
            "[orchestrator].parallel_workers must be >= 1 (got 0)".to_string(),
        ));
    }

    let lowest_initial_block = cfg
        .module
        .values()
        .map(|m| m.initial_block)
        .min()
        .unwrap_or_default();
    if orch.stop_block <= lowest_initial_block {
        return Err(OrchestratorError::ConfigError(format!(
            "[orchestrator].stop_block ({}) must be greater than the lowest module initial_block ({})",
            orch.stop_block, lowest_initial_block
        )));
    }

    Ok(())
}

fn validate_module_inputs(cfg: &RawConfigFile) -> Result<()> {
    for (name, module) in cfg.module.iter() {
        for input in module.inputs.iter() {
            if input == name {
                return Err(OrchestratorError::ConfigError(format!(
                    "module '{}' cannot list itself in `inputs`",
                    name
                )));
            }
            if !cfg.module.contains_key(input) {
                return Err(OrchestratorError::ConfigError(format!(
                    "module '{}' has unknown input '{}'",
                    name, input
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: input -> consumer.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.module.keys() {
        graph.add_node(name.as_str());
    }

    for (name, module) in cfg.module.iter() {
        for input in module.inputs.iter() {
            graph.add_edge(input.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(OrchestratorError::DagCycle(format!(
            "cycle detected in module graph involving module '{}'",
            cycle.node_id()
        ))),
    }
}
