// tests/stages.rs

mod common;
use crate::common::{segments, store_config, write_partials};

use std::sync::Arc;

use blockorch::block::{Range, Segmenter};
use blockorch::context::RunContext;
use blockorch::graph::{ModuleGraph, ModuleInfo};
use blockorch::squasher::Squasher;
use blockorch::stage::{MergeCommand, MergeMsg, Stages, Unit, UnitState};
use blockorch::store::{MemoryBackend, MemoryStore, StorageState};
use blockorch::types::ModuleKind;
use blockorch_test_utils::init_tracing;

const INTERVAL: u64 = 10;

struct Fixture {
    backend: MemoryBackend,
    graph: ModuleGraph,
    stages: Stages<MemoryStore>,
}

async fn fixture(
    modules: Vec<ModuleInfo>,
    stop_block: u64,
    storage_state: StorageState,
) -> Fixture {
    fixture_on(MemoryBackend::new(), modules, stop_block, storage_state).await
}

async fn fixture_on(
    backend: MemoryBackend,
    modules: Vec<ModuleInfo>,
    stop_block: u64,
    storage_state: StorageState,
) -> Fixture {
    let ctx = RunContext::background();
    let graph = ModuleGraph::from_modules(modules).unwrap();
    let configs = graph.store_configs();

    let stores = configs.values().map(|c| backend.store(c.clone())).collect();
    let squasher = Squasher::new(&ctx, &storage_state, stores, INTERVAL, stop_block)
        .await
        .unwrap();

    let segmenter = Segmenter::new(INTERVAL, graph.lowest_initial_block(), stop_block);
    let staged = graph.staged_modules().unwrap();
    let stages = Stages::new(
        &ctx,
        &staged,
        segmenter,
        &configs,
        &storage_state,
        Arc::new(squasher),
    );

    Fixture {
        backend,
        graph,
        stages,
    }
}

/// `a` (store) feeding `b` (store).
fn two_stores() -> Vec<ModuleInfo> {
    vec![
        ModuleInfo::new("a", ModuleKind::Store, 0),
        ModuleInfo::new("b", ModuleKind::Store, 0).with_inputs(["a"]),
    ]
}

async fn run_merge(stages: &mut Stages<MemoryStore>, stage: usize) -> Unit {
    match stages.cmd_merge(stage) {
        Some(MergeCommand::Merge { unit, task }) => match task.await {
            MergeMsg::Finished { unit: done } => {
                assert_eq!(done, unit);
                stages.merge_completed(unit);
                unit
            }
            MergeMsg::Failed { unit, error } => panic!("merge of {unit} failed: {error}"),
        },
        other => panic!("expected a merge for stage {stage}, got {other:?}"),
    }
}

async fn write_unit_partials(fx: &Fixture, unit: Unit) {
    let scheduled = fx
        .stages
        .scheduled_unit(unit, fx.stages.segmenter().range(unit.segment).unwrap())
        .unwrap();
    for (module, range) in scheduled.store_modules() {
        let config = fx.graph.get(module).unwrap().store_config().unwrap();
        write_partials(&fx.backend, &config, &[range]).await;
    }
}

#[tokio::test]
async fn schedules_along_the_diagonal() {
    init_tracing();
    let mut fx = fixture(two_stores(), 30, StorageState::new()).await;
    let stages = &mut fx.stages;

    assert_eq!(stages.stage_count(), 2);
    assert_eq!(stages.segment_offset(), 0);

    // The first segment of every stage has no upstream dependency.
    assert_eq!(stages.next_job(), Some((Unit::new(0, 1), Range::new(0, 10))));
    assert_eq!(stages.next_job(), Some((Unit::new(0, 0), Range::new(0, 10))));
    assert_eq!(stages.next_job(), Some((Unit::new(1, 0), Range::new(10, 20))));
    assert_eq!(stages.next_job(), Some((Unit::new(2, 0), Range::new(20, 30))));

    // Stage 1 segment 1 waits for stage 0 segment 0 to complete.
    assert_eq!(stages.next_job(), None);
    assert_eq!(stages.get_state(Unit::new(1, 1)), UnitState::Pending);

    write_unit_partials(&fx, Unit::new(0, 0)).await;
    let stages = &mut fx.stages;
    stages.mark_partial_present(Unit::new(0, 0));
    assert_eq!(run_merge(stages, 0).await, Unit::new(0, 0));
    assert_eq!(stages.get_state(Unit::new(0, 0)), UnitState::Completed);

    assert_eq!(stages.next_job(), Some((Unit::new(1, 1), Range::new(10, 20))));
}

#[tokio::test]
async fn merges_each_stage_in_segment_order() {
    init_tracing();
    let mut fx = fixture(two_stores(), 30, StorageState::new()).await;
    while fx.stages.next_job().is_some() {}

    write_unit_partials(&fx, Unit::new(1, 0)).await;
    write_unit_partials(&fx, Unit::new(0, 0)).await;
    let stages = &mut fx.stages;

    stages.mark_partial_present(Unit::new(1, 0));
    assert!(stages.cmd_merge(0).is_none(), "segment 1 must wait for segment 0");

    stages.mark_partial_present(Unit::new(0, 0));
    assert_eq!(run_merge(stages, 0).await, Unit::new(0, 0));
    assert_eq!(run_merge(stages, 0).await, Unit::new(1, 0));
    assert_eq!(stages.stages()[0].merge_cursor(), 2);

    // Merging leaves nothing else to do for stage 0 until segment 2 lands.
    assert!(stages.cmd_merge(0).is_none());
}

#[tokio::test]
async fn unit_states_never_move_backwards() {
    init_tracing();
    let mut fx = fixture(two_stores(), 30, StorageState::new()).await;
    let stages = &mut fx.stages;

    let unit = Unit::new(0, 0);
    stages.mark_partial_present(unit);
    stages.mark_segment_scheduled(unit);
    assert_eq!(stages.get_state(unit), UnitState::PartialPresent);

    stages.mark_segment_merging(unit);
    assert_eq!(stages.get_state(unit), UnitState::Merging);

    // Far beyond the allocated rows.
    assert_eq!(stages.get_state(Unit::new(1000, 0)), UnitState::Pending);
}

#[tokio::test]
async fn stores_completed_is_reported_once() {
    init_tracing();
    let mut fx = fixture(two_stores(), 20, StorageState::new()).await;

    let mut scheduled = Vec::new();
    let mut completions = 0;
    loop {
        while let Some((unit, _)) = fx.stages.next_job() {
            scheduled.push(unit);
        }
        let Some(unit) = scheduled.pop() else {
            break;
        };
        write_unit_partials(&fx, unit).await;
        fx.stages.mark_partial_present(unit);
        while let Some(cmd) = fx.stages.cmd_merge(unit.stage) {
            match cmd {
                MergeCommand::Merge { task, .. } => match task.await {
                    MergeMsg::Finished { unit } => fx.stages.merge_completed(unit),
                    MergeMsg::Failed { unit, error } => panic!("merge of {unit} failed: {error}"),
                },
                MergeCommand::StoresCompleted => {
                    assert!(fx.stages.all_stages_finished());
                    completions += 1;
                }
            }
        }
    }

    assert_eq!(completions, 1);
    assert!(fx.stages.all_stages_finished());
    assert!(fx.stages.cmd_start_merge().is_empty());

    let stores = fx.stages.squasher().stores_ready().await.unwrap();
    assert_eq!(stores.len(), 2);
}

#[tokio::test]
async fn intermediate_map_stages_are_not_scheduled() {
    init_tracing();
    let modules = vec![
        ModuleInfo::new("blocks", ModuleKind::Map, 0),
        ModuleInfo::new("totals", ModuleKind::Store, 0).with_inputs(["blocks"]),
        ModuleInfo::new("out", ModuleKind::Map, 0).with_inputs(["totals"]),
    ];
    let fx = fixture(modules, 30, StorageState::new()).await;

    let stages = fx.stages.stages();
    assert_eq!(stages.len(), 2);
    assert_eq!(stages[0].depth(), 1);
    assert_eq!(stages[0].kind(), ModuleKind::Store);
    assert_eq!(stages[1].depth(), 2);
    assert_eq!(stages[1].kind(), ModuleKind::Map);
}

#[tokio::test]
async fn map_only_graph_is_finished_from_the_start() {
    init_tracing();
    let modules = vec![ModuleInfo::new("blocks", ModuleKind::Map, 0)];
    let mut fx = fixture(modules, 30, StorageState::new()).await;

    let cmds = fx.stages.cmd_start_merge();
    assert_eq!(cmds.len(), 1);
    assert!(matches!(cmds[0], MergeCommand::StoresCompleted));
    assert!(fx.stages.cmd_start_merge().is_empty());
}

#[tokio::test]
async fn late_module_starts_at_its_own_segment() {
    init_tracing();
    let modules = vec![
        ModuleInfo::new("early", ModuleKind::Store, 5),
        ModuleInfo::new("late", ModuleKind::Store, 23).with_inputs(["early"]),
    ];
    let mut fx = fixture(modules, 40, StorageState::new()).await;
    let stages = &mut fx.stages;

    assert_eq!(stages.segment_offset(), 0);
    assert_eq!(stages.stages()[1].segmenter().first_index(), 2);
    assert_eq!(stages.get_state(Unit::new(1, 1)), UnitState::Completed);

    let mut jobs = Vec::new();
    while let Some(job) = stages.next_job() {
        jobs.push(job);
    }
    assert_eq!(jobs[0], (Unit::new(0, 0), Range::new(5, 10)));
    assert!(jobs.contains(&(Unit::new(2, 1), Range::new(23, 30))));
}

#[tokio::test]
async fn resumes_store_stages_from_checkpoints() {
    init_tracing();
    // Full store of `a` checkpointed at block 20.
    let backend = MemoryBackend::new();
    write_partials(&backend, &store_config("a", 0), &segments(0, 20, 20)).await;

    let state = StorageState::new().with_last_block("a", 20);
    let mut fx = fixture_on(backend, two_stores(), 30, state).await;

    let stages = &mut fx.stages;
    assert_eq!(stages.get_state(Unit::new(0, 0)), UnitState::Completed);
    assert_eq!(stages.get_state(Unit::new(1, 0)), UnitState::Completed);
    assert_eq!(stages.get_state(Unit::new(2, 0)), UnitState::Pending);
    assert_eq!(stages.stages()[0].merge_cursor(), 2);

    let progress = stages.initial_progress();
    assert_eq!(progress.get("a"), Some(&Range::new(0, 20)));
    assert_eq!(progress.get("b"), None);

    let mut jobs = Vec::new();
    while let Some((unit, _)) = stages.next_job() {
        jobs.push(unit);
    }
    assert!(jobs.contains(&Unit::new(2, 0)));
    assert!(jobs.contains(&Unit::new(1, 1)));
    assert!(!jobs.contains(&Unit::new(0, 0)));
}
