// src/graph/mod.rs

//! Module graph built from configuration, and its grouping into stages.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::ConfigFile;
use crate::errors::{OrchestratorError, Result};
use crate::store::StoreConfig;
use crate::types::{ModuleKind, UpdatePolicy};

/// What the orchestrator needs to know about one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub kind: ModuleKind,
    pub initial_block: u64,
    pub inputs: Vec<String>,
    pub update_policy: UpdatePolicy,
    pub module_hash: Option<String>,
}

impl ModuleInfo {
    pub fn new(name: impl Into<String>, kind: ModuleKind, initial_block: u64) -> Self {
        Self {
            name: name.into(),
            kind,
            initial_block,
            inputs: Vec::new(),
            update_policy: UpdatePolicy::default(),
            module_hash: None,
        }
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.update_policy = policy;
        self
    }

    pub fn is_store(&self) -> bool {
        self.kind == ModuleKind::Store
    }

    pub fn store_config(&self) -> Option<StoreConfig> {
        if !self.is_store() {
            return None;
        }
        let config = StoreConfig::new(self.name.clone(), self.initial_block, self.update_policy);
        Some(match &self.module_hash {
            Some(hash) => config.with_module_hash(hash.clone()),
            None => config,
        })
    }
}

/// Modules keyed by name, with their input edges.
///
/// Built from a validated [`ConfigFile`] (inputs known, graph acyclic), or
/// checked by [`ModuleGraph::from_modules`].
#[derive(Debug, Clone)]
pub struct ModuleGraph {
    modules: BTreeMap<String, ModuleInfo>,
}

impl ModuleGraph {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let modules = cfg
            .module
            .iter()
            .map(|(name, m)| {
                let info = ModuleInfo {
                    name: name.clone(),
                    kind: m.kind,
                    initial_block: m.initial_block,
                    inputs: m.inputs.clone(),
                    update_policy: m.update_policy,
                    module_hash: m.module_hash.clone(),
                };
                (name.clone(), info)
            })
            .collect();
        Self { modules }
    }

    pub fn from_modules(modules: impl IntoIterator<Item = ModuleInfo>) -> Result<Self> {
        let modules: BTreeMap<String, ModuleInfo> =
            modules.into_iter().map(|m| (m.name.clone(), m)).collect();

        for module in modules.values() {
            if let Some(input) = module.inputs.iter().find(|i| !modules.contains_key(*i)) {
                return Err(OrchestratorError::ModuleNotFound(format!(
                    "{input} (input of {})",
                    module.name
                )));
            }
        }

        let graph = Self { modules };
        graph.topological_order()?;
        Ok(graph)
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleInfo> {
        self.modules.values()
    }

    pub fn get(&self, name: &str) -> Option<&ModuleInfo> {
        self.modules.get(name)
    }

    pub fn inputs_of(&self, name: &str) -> &[String] {
        self.modules
            .get(name)
            .map(|m| m.inputs.as_slice())
            .unwrap_or(&[])
    }

    pub fn lowest_initial_block(&self) -> u64 {
        self.modules
            .values()
            .map(|m| m.initial_block)
            .min()
            .unwrap_or_default()
    }

    /// Store configuration of every store module, keyed by name.
    pub fn store_configs(&self) -> BTreeMap<String, StoreConfig> {
        self.modules
            .values()
            .filter_map(|m| m.store_config().map(|c| (m.name.clone(), c)))
            .collect()
    }

    /// Stores a module reads, looking through intermediate map modules.
    pub fn upstream_stores(&self, name: &str) -> Vec<&ModuleInfo> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = self.inputs_of(name).iter().map(String::as_str).collect();
        let mut out = Vec::new();

        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            let Some(module) = self.modules.get(current) else {
                continue;
            };
            match module.kind {
                ModuleKind::Store => out.push(module),
                ModuleKind::Map => stack.extend(module.inputs.iter().map(String::as_str)),
            }
        }

        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    fn topological_order(&self) -> Result<Vec<&str>> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in self.modules.keys() {
            graph.add_node(name.as_str());
        }
        for module in self.modules.values() {
            for input in &module.inputs {
                graph.add_edge(input.as_str(), module.name.as_str(), ());
            }
        }

        toposort(&graph, None).map_err(|cycle| {
            OrchestratorError::DagCycle(format!(
                "cycle detected in module graph involving module '{}'",
                cycle.node_id()
            ))
        })
    }

    /// Modules grouped by depth: depth 0 holds modules without inputs, and a
    /// module sits one level below its deepest input. Each group is sorted by
    /// name.
    pub fn staged_modules(&self) -> Result<Vec<Vec<ModuleInfo>>> {
        let order = self.topological_order()?;
        let mut depth: HashMap<&str, usize> = HashMap::new();

        for name in order {
            let d = self
                .inputs_of(name)
                .iter()
                .filter_map(|i| depth.get(i.as_str()))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(name, d);
        }

        let levels = depth.values().copied().max().map_or(0, |d| d + 1);
        let mut stages: Vec<Vec<ModuleInfo>> = vec![Vec::new(); levels];
        for module in self.modules.values() {
            if let Some(d) = depth.get(module.name.as_str()) {
                stages[*d].push(module.clone());
            }
        }
        Ok(stages)
    }
}
