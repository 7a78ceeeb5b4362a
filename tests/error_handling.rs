// tests/error_handling.rs

use std::io::Write;
use tempfile::NamedTempFile;

use blockorch::config::{ConfigFile, load_and_validate, load_from_path};
use blockorch::errors::OrchestratorError;
use blockorch::graph::{ModuleGraph, ModuleInfo};
use blockorch::types::{ModuleKind, OrchestrationMode, UpdatePolicy};
use blockorch_test_utils::builders::{ConfigFileBuilder, ModuleConfigBuilder};

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_full_config_loads_with_defaults() {
    let file = config_file(
        r#"
[orchestrator]
segment_interval = 100
store_save_interval = 1000
parallel_workers = 4
stop_block = 5000
mode = "pool"

[module.map_transfers]
kind = "map"
initial_block = 12

[module.store_balances]
kind = "store"
initial_block = 12
inputs = ["map_transfers"]
update_policy = "append"
module_hash = "3f2a"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.orchestrator.segment_interval, 100);
    assert_eq!(cfg.orchestrator.effective_store_save_interval(), 1000);
    assert_eq!(cfg.orchestrator.parallel_workers, 4);
    assert_eq!(cfg.orchestrator.mode, OrchestrationMode::Pool);

    let store = &cfg.module["store_balances"];
    assert_eq!(store.kind, ModuleKind::Store);
    assert_eq!(store.update_policy, UpdatePolicy::Append);
    assert_eq!(store.inputs, vec!["map_transfers".to_string()]);

    let graph = ModuleGraph::from_config(&cfg);
    let configs = graph.store_configs();
    assert_eq!(configs["store_balances"].module_hash(), "3f2a");
    assert_eq!(graph.lowest_initial_block(), 12);
}

#[test]
fn test_orchestrator_section_is_optional() {
    let file = config_file(
        r#"
[module.a]
kind = "store"
"#,
    );

    let raw = load_from_path(file.path()).unwrap();
    assert_eq!(raw.orchestrator.segment_interval, 1000);
    assert_eq!(raw.orchestrator.effective_store_save_interval(), 1000);
    assert_eq!(raw.orchestrator.parallel_workers, 1);
    assert_eq!(raw.orchestrator.mode, OrchestrationMode::Stages);

    // stop_block defaults to 0, which leaves no window to run.
    match ConfigFile::try_from(raw) {
        Err(OrchestratorError::ConfigError(msg)) => assert!(msg.contains("stop_block"), "{msg}"),
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn test_module_cycle_returns_structured_error() {
    let file = config_file(
        r#"
[orchestrator]
stop_block = 100

[module.A]
kind = "store"
inputs = ["B"]

[module.B]
kind = "store"
inputs = ["A"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(OrchestratorError::DagCycle(msg)) => {
            assert!(msg.contains("cycle detected"));
            assert!(msg.contains("A") || msg.contains("B"));
        }
        Err(e) => panic!("Expected DagCycle error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_unknown_input_returns_config_error() {
    let file = config_file(
        r#"
[orchestrator]
stop_block = 100

[module.A]
kind = "store"
inputs = ["NonExistent"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(OrchestratorError::ConfigError(msg)) => {
            assert!(msg.contains("unknown input"));
            assert!(msg.contains("NonExistent"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_invalid_kind_is_a_toml_error() {
    let file = config_file(
        r#"
[module.A]
kind = "reducer"
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(OrchestratorError::TomlError(_))
    ));
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("Blockorch.toml");

    assert!(matches!(
        load_and_validate(&missing),
        Err(OrchestratorError::IoError(_))
    ));
}

#[test]
fn test_orchestrator_bounds_are_validated() {
    let base = || {
        ConfigFileBuilder::new()
            .stop_block(1000)
            .with_module("a", ModuleConfigBuilder::store().build())
    };

    let cases = [
        (base().segment_interval(0).build_raw(), "segment_interval"),
        (base().store_save_interval(0).build_raw(), "store_save_interval"),
        (
            base().segment_interval(100).store_save_interval(150).build_raw(),
            "multiple of segment_interval",
        ),
        (base().parallel_workers(0).build_raw(), "parallel_workers"),
        (ConfigFileBuilder::new().stop_block(10).build_raw(), "at least one"),
        (
            ConfigFileBuilder::new()
                .stop_block(10)
                .with_module("a", ModuleConfigBuilder::store().initial_block(10).build())
                .build_raw(),
            "stop_block",
        ),
        (
            base()
                .with_module("b", ModuleConfigBuilder::map().input("b").build())
                .build_raw(),
            "cannot list itself",
        ),
    ];

    for (raw, expected) in cases {
        match ConfigFile::try_from(raw) {
            Err(OrchestratorError::ConfigError(msg)) => {
                assert!(msg.contains(expected), "expected {expected:?} in {msg:?}")
            }
            other => panic!("Expected ConfigError containing {expected:?}, got: {:?}", other),
        }
    }
}

#[test]
fn test_graph_from_modules_checks_edges() {
    let unknown = ModuleGraph::from_modules([
        ModuleInfo::new("a", ModuleKind::Store, 0).with_inputs(["ghost"]),
    ]);
    assert!(matches!(unknown, Err(OrchestratorError::ModuleNotFound(_))));

    let cycle = ModuleGraph::from_modules([
        ModuleInfo::new("a", ModuleKind::Store, 0).with_inputs(["b"]),
        ModuleInfo::new("b", ModuleKind::Store, 0).with_inputs(["a"]),
    ]);
    assert!(matches!(cycle, Err(OrchestratorError::DagCycle(_))));
}

#[test]
fn test_graph_stages_and_upstream_stores() {
    let graph = ModuleGraph::from_modules([
        ModuleInfo::new("blocks", ModuleKind::Map, 0),
        ModuleInfo::new("prices", ModuleKind::Store, 0).with_inputs(["blocks"]),
        ModuleInfo::new("transfers", ModuleKind::Map, 0).with_inputs(["prices"]),
        ModuleInfo::new("balances", ModuleKind::Store, 0).with_inputs(["transfers", "blocks"]),
    ])
    .unwrap();

    let staged: Vec<Vec<String>> = graph
        .staged_modules()
        .unwrap()
        .into_iter()
        .map(|stage| stage.into_iter().map(|m| m.name).collect())
        .collect();
    assert_eq!(
        staged,
        vec![
            vec!["blocks".to_string()],
            vec!["prices".to_string()],
            vec!["transfers".to_string()],
            vec!["balances".to_string()],
        ]
    );

    let upstream: Vec<&str> = graph
        .upstream_stores("balances")
        .into_iter()
        .map(|m| m.name.as_str())
        .collect();
    assert_eq!(upstream, vec!["prices"]);
    assert!(graph.upstream_stores("prices").is_empty());
}
