// tests/store_backend.rs

use blockorch::block::Range;
use blockorch::context::RunContext;
use blockorch::errors::StoreError;
use blockorch::store::listing::{
    full_file_name, list_snapshot_files, parse_file_name, partial_file_name,
};
use blockorch::store::{MemoryBackend, StorageState, Store, StoreConfig};
use blockorch::types::UpdatePolicy;
use blockorch_test_utils::init_tracing;

#[test]
fn snapshot_file_names_round_trip_through_the_parser() {
    assert_eq!(full_file_name(2000, 0), "0000002000-0000000000.kv");
    assert_eq!(partial_file_name(3000, 2000), "0000003000-0000002000.partial");

    let info = parse_file_name("0000003000-0000002000.partial").unwrap();
    assert_eq!((info.start_block, info.end_block, info.partial), (2000, 3000, true));

    assert!(parse_file_name("0000003000-0000002000.zst").is_none());
    assert!(parse_file_name("state.kv").is_none());
}

#[tokio::test]
async fn listing_skips_foreign_objects_and_later_snapshots() {
    init_tracing();
    let ctx = RunContext::background();
    let backend = MemoryBackend::new();
    let config = StoreConfig::new("s", 0, UpdatePolicy::Set);
    let mut store = backend.store(config.clone());

    store.set("k", "v").unwrap();
    store.write_state(100).await.unwrap();
    store.write_state(300).await.unwrap();
    store.clone_structure(100).write_state(200).await.unwrap();

    let files = list_snapshot_files(&ctx, &backend, "s", 250).await.unwrap();
    let names: Vec<&str> = files.iter().map(|f| f.filename.as_str()).collect();
    assert_eq!(
        names,
        vec!["0000000100-0000000000.kv", "0000000200-0000000100.partial"]
    );

    let state = StorageState::fetch(&ctx, &backend, &[config], 100, 250).await.unwrap();
    assert_eq!(state.last_block("s"), Some(100));
    assert_eq!(state.last_block("unknown"), None);
}

#[tokio::test]
async fn listing_retries_transient_failures() {
    init_tracing();
    let ctx = RunContext::background();
    let backend = MemoryBackend::new();
    let config = StoreConfig::new("s", 0, UpdatePolicy::Set);
    backend.store(config.clone()).write_state(100).await.unwrap();

    backend.fail_next_listings(2);
    let state = StorageState::fetch(&ctx, &backend, std::slice::from_ref(&config), 100, 1000)
        .await
        .unwrap();
    assert_eq!(state.last_block("s"), Some(100));

    backend.fail_next_listings(3);
    let err = StorageState::fetch(&ctx, &backend, &[config], 100, 1000)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)), "{err:?}");
}

#[tokio::test]
async fn canceled_context_stops_retrying() {
    init_tracing();
    let (ctx, cancel) = RunContext::new("listing-cancel");
    cancel.cancel();

    let backend = MemoryBackend::new();
    let config = StoreConfig::new("s", 0, UpdatePolicy::Set);
    let err = StorageState::fetch(&ctx, &backend, &[config], 100, 1000)
        .await
        .unwrap_err();
    match err {
        StoreError::Unavailable(msg) => assert!(msg.contains("canceled"), "{msg}"),
        other => panic!("expected Unavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn memory_store_applies_update_policies_and_limits() {
    let backend = MemoryBackend::new();

    let mut keep_first = backend.store(StoreConfig::new("first", 0, UpdatePolicy::SetIfNotExists));
    keep_first.set("k", "a").unwrap();
    keep_first.set("k", "b").unwrap();
    assert_eq!(keep_first.get("k"), Some("a".as_bytes()));

    let mut small =
        backend.store(StoreConfig::new("small", 0, UpdatePolicy::Append).with_limits(4, 3));
    small.set("k", "ab").unwrap();
    assert!(matches!(small.set("k", "abcd"), Err(StoreError::LimitExceeded { .. })));
    assert!(matches!(small.set("k", "cde"), Err(StoreError::LimitExceeded { .. })));
    small.set("k", "cd").unwrap();
    assert_eq!(small.get("k"), Some("abcd".as_bytes()));
}

#[tokio::test]
async fn memory_store_keeps_full_and_partial_snapshots_apart() {
    let backend = MemoryBackend::new();
    let config = StoreConfig::new("s", 10, UpdatePolicy::Set).with_module_hash("ns");
    let full = backend.store(config);

    let mut partial = full.clone_structure(20);
    assert!(partial.is_partial());
    partial.set("k", "v").unwrap();
    partial.write_state(30).await.unwrap();
    assert!(backend.has_file("ns", "0000000030-0000000020.partial"));

    let loaded = full.load_from(&Range::new(20, 30)).await.unwrap();
    assert_eq!(loaded.get("k"), Some("v".as_bytes()));

    let missing = full.load_from(&Range::new(10, 30)).await.unwrap_err();
    assert!(matches!(missing, StoreError::NotFound { .. }));

    loaded.delete_store(30).await.unwrap();
    assert!(backend.files("ns").is_empty());
}
