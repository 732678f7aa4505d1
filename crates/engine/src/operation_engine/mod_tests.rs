// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use graphsync_adapters::{
    AdapterError, BulkOutcome, BulkWriteOptions, CheckpointAnnotation, Entity as AdapterEntity,
    EntityPatch, FakeGitProvider, FakeModuleIndexer, FakeParser, GraphStore, InMemoryGraphStore,
    ParseResult, ScanScope, WriteOptions,
};
use graphsync_core::{ChangeType, FakeClock};
use std::sync::Once;
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn harness_with_config(parser: Arc<FakeParser>, config: EngineConfig) -> (OperationEngine<FakeClock>, Arc<InMemoryGraphStore>) {
    init_tracing();
    let clock = FakeClock::new();
    let store = Arc::new(InMemoryGraphStore::new());
    let checkpoint_runner = Arc::new(CheckpointRunner::new(store.clone()));
    let sequence_tracker = Arc::new(SequenceTracker::new());
    let engine = OperationEngine::new(
        clock,
        config,
        store.clone(),
        parser,
        Arc::new(FakeModuleIndexer::default()),
        Arc::new(FakeGitProvider::default()),
        checkpoint_runner,
        sequence_tracker,
    );
    (engine, store)
}

fn harness_with(parser: Arc<FakeParser>) -> (OperationEngine<FakeClock>, Arc<InMemoryGraphStore>) {
    harness_with_config(parser, EngineConfig::default())
}

fn harness() -> (OperationEngine<FakeClock>, Arc<InMemoryGraphStore>) {
    harness_with(Arc::new(FakeParser::new()))
}

/// A retry policy fast enough for a test to observe every attempt within
/// `wait_terminal`'s ~1s polling budget, rather than the real 5s/10s/15s
/// backoff (§4.1).
fn fast_retry_config() -> EngineConfig {
    EngineConfig { retry: graphsync_core::RetryPolicy { max_attempts: 3, base_delay: Duration::from_millis(10) }, ..EngineConfig::default() }
}

async fn wait_terminal(engine: &OperationEngine<FakeClock>, operation_id: &str) -> SyncOperation {
    for _ in 0..200 {
        if let Some(op) = engine.get_status(operation_id) {
            if op.status.is_terminal() {
                return op;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("operation {operation_id} did not reach a terminal state");
}

fn create_update(data: serde_json::Value) -> graphsync_core::PartialUpdate {
    graphsync_core::PartialUpdate {
        entity_id: "e1".into(),
        kind: graphsync_core::PartialUpdateType::Create,
        changes: None,
        new_value: Some(data),
    }
}

#[tokio::test]
async fn partial_sync_creates_entity_and_completes() {
    let (engine, store) = harness();
    let id = engine.start_partial(vec![create_update(serde_json::json!({"name": "hello"}))], OperationOptions::default()).await.unwrap();
    let op = wait_terminal(&engine, &id).await;
    assert_eq!(op.status, SyncOperationStatus::Completed);
    assert_eq!(op.counters.entities_created, 1);
    assert_eq!(store.entity_count(), 1);
}

#[tokio::test]
async fn full_sync_processes_every_listed_file() {
    let parser = FakeParser::new().with_files(vec!["a.rs".into(), "b.rs".into()]);
    parser.seed(
        "a.rs",
        ParseResult {
            entities: vec![AdapterEntity { id: "a1".into(), file: "a.rs".into(), kind: "fn".into(), name: None, data: serde_json::Value::Null }],
            relationships: vec![],
        },
    );
    parser.seed(
        "b.rs",
        ParseResult {
            entities: vec![AdapterEntity { id: "b1".into(), file: "b.rs".into(), kind: "fn".into(), name: None, data: serde_json::Value::Null }],
            relationships: vec![],
        },
    );
    let (engine, store) = harness_with(Arc::new(parser));

    let id = engine.start_full(OperationOptions::default()).await.unwrap();
    let op = wait_terminal(&engine, &id).await;
    assert_eq!(op.status, SyncOperationStatus::Completed);
    assert_eq!(op.counters.files_processed, 2);
    assert_eq!(store.entity_count(), 2);
}

#[tokio::test]
async fn cancel_while_queued_finalizes_as_cancelled() {
    let (engine, _store) = harness();
    engine.pause();
    let id = engine.start_partial(vec![create_update(serde_json::json!({}))], OperationOptions::default()).await.unwrap();
    assert!(engine.cancel(&id));
    engine.resume();
    let op = wait_terminal(&engine, &id).await;
    assert_eq!(op.status, SyncOperationStatus::Failed);
    let stats = engine.get_statistics();
    assert_eq!(stats.cancelled, 1);
}

#[tokio::test]
async fn cancel_of_unknown_operation_returns_false() {
    let (engine, _store) = harness();
    assert!(!engine.cancel("does-not-exist"));
}

#[tokio::test]
async fn cancel_of_terminal_operation_is_a_no_op_true() {
    let (engine, _store) = harness();
    let id = engine.start_partial(vec![create_update(serde_json::json!({}))], OperationOptions::default()).await.unwrap();
    wait_terminal(&engine, &id).await;
    assert!(engine.cancel(&id));
}

#[tokio::test]
async fn pause_blocks_the_queue_until_resume() {
    let (engine, store) = harness();
    engine.pause();
    let id = engine.start_partial(vec![create_update(serde_json::json!({}))], OperationOptions::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(store.entity_count(), 0);
    engine.resume();
    let op = wait_terminal(&engine, &id).await;
    assert_eq!(op.status, SyncOperationStatus::Completed);
}

#[tokio::test]
async fn update_tuning_clamps_into_documented_bounds() {
    let (engine, _store) = harness();
    engine.pause();
    let id = engine.start_partial(vec![create_update(serde_json::json!({}))], OperationOptions::default()).await.unwrap();
    assert!(engine.update_tuning(&id, Some(9999.0), Some(0.0)));
    let op = engine.get_status(&id).unwrap();
    let tuning = op.tuning.unwrap();
    assert_eq!(tuning.max_concurrency, graphsync_core::MAX_CONCURRENCY_MAX);
    assert_eq!(tuning.batch_size, graphsync_core::BATCH_SIZE_MIN);
    engine.resume();
    wait_terminal(&engine, &id).await;
}

#[tokio::test]
async fn update_tuning_ignores_non_finite_inputs() {
    let (engine, _store) = harness();
    engine.pause();
    let id = engine.start_partial(vec![create_update(serde_json::json!({}))], OperationOptions::default()).await.unwrap();
    assert!(engine.update_tuning(&id, Some(f64::NAN), None));
    let op = engine.get_status(&id).unwrap();
    assert!(op.tuning.is_some());
    engine.resume();
    wait_terminal(&engine, &id).await;
}

#[tokio::test]
async fn update_tuning_of_unknown_operation_returns_false() {
    let (engine, _store) = harness();
    assert!(!engine.update_tuning("does-not-exist", Some(2.0), None));
}

fn update_with_recoverable_failure() -> graphsync_core::PartialUpdate {
    graphsync_core::PartialUpdate {
        entity_id: "e1".into(),
        kind: graphsync_core::PartialUpdateType::Update,
        changes: Some(serde_json::json!({"name": "x"})),
        new_value: None,
    }
}

#[tokio::test]
async fn failed_operation_retries_and_eventually_succeeds() {
    let (engine, store) = harness_with_config(Arc::new(FakeParser::new()), fast_retry_config());
    store.fail_rollback.store(true, std::sync::atomic::Ordering::SeqCst);
    let mut options = OperationOptions::default();
    options.timeout_ms = 120_000;
    let id = engine.start_partial(vec![update_with_recoverable_failure()], options).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    store.fail_rollback.store(false, std::sync::atomic::Ordering::SeqCst);

    let op = wait_terminal(&engine, &id).await;
    assert_eq!(op.status, SyncOperationStatus::Completed);
    assert!(op.attempts >= 1);
}

#[tokio::test]
async fn retry_exhausts_after_max_attempts_then_abandons() {
    let (engine, store) = harness_with_config(Arc::new(FakeParser::new()), fast_retry_config());
    store.fail_rollback.store(true, std::sync::atomic::Ordering::SeqCst);
    let mut options = OperationOptions::default();
    options.timeout_ms = 120_000;
    let mut events = engine.subscribe();

    let id = engine.start_partial(vec![update_with_recoverable_failure()], options).await.unwrap();
    let op = wait_terminal(&engine, &id).await;

    assert_eq!(op.status, SyncOperationStatus::Failed);
    assert_eq!(op.attempts, 3);

    let mut saw_abandoned = false;
    while let Ok(event) = events.try_recv() {
        if let Event::OperationAbandoned { operation_id, attempts } = event {
            assert_eq!(operation_id, id);
            assert_eq!(attempts, 3);
            saw_abandoned = true;
        }
    }
    assert!(saw_abandoned, "expected an OperationAbandoned event after exhausting retries");
}

#[tokio::test]
async fn non_recoverable_error_is_not_retried() {
    let parser = FakeParser::new();
    parser.fail_list_files.store(true, std::sync::atomic::Ordering::SeqCst);
    let (engine, _store) = harness_with_config(Arc::new(parser), fast_retry_config());
    let mut events = engine.subscribe();

    let id = engine.start_full(OperationOptions::default()).await.unwrap();
    let op = wait_terminal(&engine, &id).await;

    assert_eq!(op.status, SyncOperationStatus::Failed);
    assert_eq!(op.attempts, 0);
    assert!(op.errors.iter().any(|e| !e.recoverable));

    let mut saw_abandoned = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, Event::OperationAbandoned { .. }) {
            saw_abandoned = true;
        }
    }
    assert!(!saw_abandoned, "a non-recoverable failure finalizes on the first attempt, never abandons");
}

#[tokio::test]
async fn statistics_total_accounts_for_every_bucket() {
    let (engine, _store) = harness();
    let id = engine.start_partial(vec![create_update(serde_json::json!({}))], OperationOptions::default()).await.unwrap();
    wait_terminal(&engine, &id).await;

    let stats = engine.get_statistics();
    assert_eq!(stats.total, stats.active + stats.queued + stats.completed + stats.failed + stats.cancelled);
    assert_eq!(stats.completed, 1);
}

#[tokio::test]
async fn incremental_sync_applies_a_delete_change() {
    let (engine, store) = harness();
    store
        .create_entity(
            AdapterEntity { id: "e1".into(), file: "deleted.rs".into(), kind: "fn".into(), name: None, data: serde_json::Value::Null },
            WriteOptions::default(),
        )
        .await
        .unwrap();

    let change = graphsync_core::FileChange { file: "deleted.rs".into(), kind: ChangeType::Delete, change_id: None };
    let id = engine.start_incremental(vec![change], OperationOptions::default()).await.unwrap();
    let op = wait_terminal(&engine, &id).await;
    assert_eq!(op.status, SyncOperationStatus::Completed);
    assert_eq!(store.entity_count(), 0);
}

/// A store that reports itself as never ready, so `submit` rejects before
/// touching any other method.
struct NeverReadyStore;

#[async_trait::async_trait]
impl GraphStore for NeverReadyStore {
    async fn is_ready(&self) -> bool {
        false
    }
    async fn create_entity(&self, _entity: AdapterEntity, _opts: WriteOptions) -> Result<String, AdapterError> {
        unimplemented!()
    }
    async fn create_entities_bulk(&self, _entities: Vec<AdapterEntity>, _opts: BulkWriteOptions) -> Result<BulkOutcome, AdapterError> {
        unimplemented!()
    }
    async fn update_entity(&self, _id: &str, _patch: EntityPatch, _opts: WriteOptions) -> Result<(), AdapterError> {
        unimplemented!()
    }
    async fn delete_entity(&self, _id: &str) -> Result<(), AdapterError> {
        unimplemented!()
    }
    async fn get_entity(&self, _id: &str) -> Result<Option<AdapterEntity>, AdapterError> {
        unimplemented!()
    }
    async fn get_entities_by_file(&self, _path: &str, _include_symbols: bool) -> Result<Vec<AdapterEntity>, AdapterError> {
        unimplemented!()
    }
    async fn create_relationship(&self, _rel: graphsync_core::Relationship, _validate: bool) -> Result<String, AdapterError> {
        unimplemented!()
    }
    async fn create_relationships_bulk(&self, _rels: Vec<graphsync_core::Relationship>, _opts: BulkWriteOptions) -> Result<BulkOutcome, AdapterError> {
        unimplemented!()
    }
    async fn open_edge(&self, _from: &str, _to: &str, _kind: &str, _at: u64, _change_id: &str) -> Result<String, AdapterError> {
        unimplemented!()
    }
    async fn close_edge(&self, _from: &str, _to: &str, _kind: &str, _at: u64, _change_id: &str) -> Result<(), AdapterError> {
        unimplemented!()
    }
    async fn upsert_edge_evidence_bulk(&self, _rels: Vec<graphsync_core::Relationship>) -> Result<(), AdapterError> {
        unimplemented!()
    }
    async fn delete_relationship(&self, _id: &str) -> Result<(), AdapterError> {
        unimplemented!()
    }
    async fn append_version(&self, _entity_id: &str, _timestamp: u64, _change_set_id: &str) -> Result<(), AdapterError> {
        unimplemented!()
    }
    async fn find_symbol_in_file(&self, _path: &str, _name: &str) -> Result<Vec<String>, AdapterError> {
        unimplemented!()
    }
    async fn find_nearby_symbols(&self, _path: &str, _name: &str, _k: usize) -> Result<Vec<String>, AdapterError> {
        unimplemented!()
    }
    async fn find_symbol_by_kind_and_name(&self, _kind: &str, _name: &str) -> Result<Vec<String>, AdapterError> {
        unimplemented!()
    }
    async fn find_symbols_by_name(&self, _name: &str) -> Result<Vec<String>, AdapterError> {
        unimplemented!()
    }
    async fn finalize_scan(&self, _scope: ScanScope) -> Result<(), AdapterError> {
        unimplemented!()
    }
    async fn materialize_checkpoint(&self, _seed_entity_ids: Vec<String>, _hop_count: u8) -> Result<String, AdapterError> {
        unimplemented!()
    }
    async fn annotate_session_relationships_with_checkpoint(&self, _session_id: &str, _seeds: Vec<String>, _annotation: CheckpointAnnotation) -> Result<(), AdapterError> {
        unimplemented!()
    }
}

#[tokio::test]
async fn submit_without_a_ready_graph_store_is_rejected() {
    let clock = FakeClock::new();
    let store = Arc::new(NeverReadyStore);
    let checkpoint_runner = Arc::new(CheckpointRunner::new(store.clone()));
    let sequence_tracker = Arc::new(SequenceTracker::new());
    let engine = OperationEngine::new(
        clock,
        EngineConfig::default(),
        store,
        Arc::new(FakeParser::new()),
        Arc::new(FakeModuleIndexer::default()),
        Arc::new(FakeGitProvider::default()),
        checkpoint_runner,
        sequence_tracker,
    );
    let err = engine.start_full(OperationOptions::default()).await.unwrap_err();
    assert!(matches!(err, SubmitError::NotReady));
}
