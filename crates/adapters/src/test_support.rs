// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory fakes for the adapter traits, gated behind `test-support` the
//! way the teacher's `oj-adapters` exposes a `FakeAdapter` for other
//! crates' suites. Real stores are out of scope (§1); every component still
//! needs something concrete to run its tests against.

use crate::checkpoint_persistence::{CheckpointPersistence, PersistedJob};
use crate::error::AdapterError;
use crate::git_provider::{CommitInfo, GitProvider};
use crate::graph_store::{
    BulkOutcome, BulkWriteOptions, CheckpointAnnotation, EntityPatch, GraphStore, ScanScope,
    WriteOptions,
};
use crate::module_indexer::ModuleIndexer;
use crate::parser::{Entity, IncrementalParseResult, ParseResult, Parser};
use async_trait::async_trait;
use graphsync_core::Relationship;
use parking_lot::Mutex;
use std::collections::HashMap;

/// A graph store backed by in-process maps. Bulk operations never fail
/// unless `fail_bulk` is set, so tests can exercise the per-item fallback
/// path deliberately.
#[derive(Default)]
pub struct InMemoryGraphStore {
    entities: Mutex<HashMap<String, Entity>>,
    relationships: Mutex<HashMap<String, Relationship>>,
    annotations: Mutex<Vec<(String, Vec<String>, CheckpointAnnotation)>>,
    finalized_scans: Mutex<Vec<ScanScope>>,
    pub fail_bulk: std::sync::atomic::AtomicBool,
    pub embeddings_available: std::sync::atomic::AtomicBool,
    pub fail_checkpoint: std::sync::atomic::AtomicBool,
    pub fail_rollback: std::sync::atomic::AtomicBool,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self { embeddings_available: std::sync::atomic::AtomicBool::new(true), ..Default::default() }
    }

    pub fn entity_count(&self) -> usize {
        self.entities.lock().len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.lock().len()
    }

    pub fn relationships_snapshot(&self) -> Vec<Relationship> {
        self.relationships.lock().values().cloned().collect()
    }

    pub fn annotations(&self) -> Vec<(String, Vec<String>, CheckpointAnnotation)> {
        self.annotations.lock().clone()
    }

    pub fn finalized_scans(&self) -> Vec<ScanScope> {
        self.finalized_scans.lock().clone()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn is_ready(&self) -> bool {
        true
    }

    async fn create_entity(&self, entity: Entity, _opts: WriteOptions) -> Result<String, AdapterError> {
        let id = entity.id.clone();
        self.entities.lock().insert(id.clone(), entity);
        Ok(id)
    }

    async fn create_entities_bulk(
        &self,
        entities: Vec<Entity>,
        _opts: BulkWriteOptions,
    ) -> Result<BulkOutcome, AdapterError> {
        if self.fail_bulk.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AdapterError::Database { message: "bulk entity insert unavailable".into() });
        }
        let mut succeeded = Vec::with_capacity(entities.len());
        let mut guard = self.entities.lock();
        for e in entities {
            succeeded.push(e.id.clone());
            guard.insert(e.id.clone(), e);
        }
        Ok(BulkOutcome { succeeded, failed: Vec::new() })
    }

    async fn update_entity(&self, id: &str, patch: EntityPatch, _opts: WriteOptions) -> Result<(), AdapterError> {
        if self.fail_rollback.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AdapterError::Database { message: format!("update_entity failed for {id}") });
        }
        let mut guard = self.entities.lock();
        let entity = guard
            .get_mut(id)
            .ok_or_else(|| AdapterError::Database { message: format!("unknown entity {id}") })?;
        entity.data = patch.data;
        Ok(())
    }

    async fn delete_entity(&self, id: &str) -> Result<(), AdapterError> {
        if self.fail_rollback.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AdapterError::Database { message: format!("delete_entity failed for {id}") });
        }
        self.entities.lock().remove(id);
        Ok(())
    }

    async fn get_entity(&self, id: &str) -> Result<Option<Entity>, AdapterError> {
        Ok(self.entities.lock().get(id).cloned())
    }

    async fn get_entities_by_file(&self, path: &str, _include_symbols: bool) -> Result<Vec<Entity>, AdapterError> {
        Ok(self.entities.lock().values().filter(|e| e.file == path).cloned().collect())
    }

    async fn create_relationship(&self, rel: Relationship, _validate: bool) -> Result<String, AdapterError> {
        let id = rel.id.clone();
        self.relationships.lock().insert(id.clone(), rel);
        Ok(id)
    }

    async fn create_relationships_bulk(
        &self,
        rels: Vec<Relationship>,
        _opts: BulkWriteOptions,
    ) -> Result<BulkOutcome, AdapterError> {
        if self.fail_bulk.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AdapterError::Database { message: "bulk relationship insert unavailable".into() });
        }
        let mut succeeded = Vec::with_capacity(rels.len());
        let mut guard = self.relationships.lock();
        for r in rels {
            succeeded.push(r.id.clone());
            guard.insert(r.id.clone(), r);
        }
        Ok(BulkOutcome { succeeded, failed: Vec::new() })
    }

    async fn open_edge(&self, from: &str, to: &str, kind: &str, at: u64, change_id: &str) -> Result<String, AdapterError> {
        let id = format!("edge_{from}_{to}_{kind}_{at}");
        self.relationships.lock().insert(
            id.clone(),
            Relationship {
                id: id.clone(),
                kind: kind.into(),
                from_entity_id: from.into(),
                to_entity_id: to.into(),
                created: at,
                last_modified: at,
                version: 1,
                metadata: None,
                session_id: None,
                sequence_number: None,
                timestamp: Some(at),
                event_id: None,
                actor: None,
                annotations: None,
                change_info: Some(graphsync_core::ChangeInfo {
                    kind: graphsync_core::ChangeKind::Created,
                    change_id: change_id.into(),
                    commit_hash: None,
                    commit_author: None,
                }),
                state_transition: None,
                impact: None,
                to_ref: None,
                from_ref: None,
                ambiguous: false,
                source_file: None,
            },
        );
        Ok(id)
    }

    async fn close_edge(&self, from: &str, to: &str, kind: &str, _at: u64, _change_id: &str) -> Result<(), AdapterError> {
        let prefix = format!("edge_{from}_{to}_{kind}_");
        self.relationships.lock().retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }

    async fn upsert_edge_evidence_bulk(&self, _rels: Vec<Relationship>) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn delete_relationship(&self, id: &str) -> Result<(), AdapterError> {
        if self.fail_rollback.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AdapterError::Database { message: format!("delete_relationship failed for {id}") });
        }
        self.relationships.lock().remove(id);
        Ok(())
    }

    async fn append_version(&self, _entity_id: &str, _timestamp: u64, _change_set_id: &str) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn find_symbol_in_file(&self, path: &str, name: &str) -> Result<Vec<String>, AdapterError> {
        Ok(self
            .entities
            .lock()
            .values()
            .filter(|e| e.file == path && e.name.as_deref() == Some(name))
            .map(|e| e.id.clone())
            .collect())
    }

    async fn find_nearby_symbols(&self, path: &str, name: &str, k: usize) -> Result<Vec<String>, AdapterError> {
        let dir = path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
        let mut found: Vec<String> = self
            .entities
            .lock()
            .values()
            .filter(|e| e.file.starts_with(dir) && e.name.as_deref() == Some(name))
            .map(|e| e.id.clone())
            .collect();
        found.truncate(k);
        Ok(found)
    }

    async fn find_symbol_by_kind_and_name(&self, kind: &str, name: &str) -> Result<Vec<String>, AdapterError> {
        Ok(self
            .entities
            .lock()
            .values()
            .filter(|e| e.kind == kind && e.name.as_deref() == Some(name))
            .map(|e| e.id.clone())
            .collect())
    }

    async fn find_symbols_by_name(&self, name: &str) -> Result<Vec<String>, AdapterError> {
        Ok(self
            .entities
            .lock()
            .values()
            .filter(|e| e.name.as_deref() == Some(name))
            .map(|e| e.id.clone())
            .collect())
    }

    async fn create_embeddings_batch(&self, entity_ids: Vec<String>) -> Result<(), AdapterError> {
        if self.embeddings_available.load(std::sync::atomic::Ordering::SeqCst) {
            let _ = entity_ids;
            Ok(())
        } else {
            Err(AdapterError::Capability { capability: "create_embeddings_batch".into() })
        }
    }

    async fn finalize_scan(&self, scope: ScanScope) -> Result<(), AdapterError> {
        self.finalized_scans.lock().push(scope);
        Ok(())
    }

    async fn materialize_checkpoint(
        &self,
        seed_entity_ids: Vec<String>,
        hop_count: u8,
    ) -> Result<String, AdapterError> {
        if self.fail_checkpoint.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AdapterError::Database { message: "checkpoint materialization unavailable".into() });
        }
        Ok(format!("ckpt_{}_{}", seed_entity_ids.join("-"), hop_count))
    }

    async fn annotate_session_relationships_with_checkpoint(
        &self,
        session_id: &str,
        seeds: Vec<String>,
        annotation: CheckpointAnnotation,
    ) -> Result<(), AdapterError> {
        self.annotations.lock().push((session_id.into(), seeds, annotation));
        Ok(())
    }
}

/// A checkpoint persistence store backed by an in-process map.
#[derive(Default)]
pub struct MemoryCheckpointPersistence {
    jobs: Mutex<HashMap<String, PersistedJob>>,
}

impl MemoryCheckpointPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointPersistence for MemoryCheckpointPersistence {
    async fn put(&self, job: PersistedJob) -> Result<(), AdapterError> {
        self.jobs.lock().insert(job.job_id.clone(), job);
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<PersistedJob>, AdapterError> {
        Ok(self.jobs.lock().get(job_id).cloned())
    }

    async fn delete(&self, job_id: &str) -> Result<(), AdapterError> {
        self.jobs.lock().remove(job_id);
        Ok(())
    }

    async fn list_queued(&self) -> Result<Vec<PersistedJob>, AdapterError> {
        Ok(self
            .jobs
            .lock()
            .values()
            .filter(|j| j.state == graphsync_core::CheckpointJobState::Queued)
            .cloned()
            .collect())
    }
}

/// A parser fake whose per-file results are pre-seeded by the test.
#[derive(Default)]
pub struct FakeParser {
    files: Mutex<Vec<String>>,
    results: Mutex<HashMap<String, ParseResult>>,
    incremental_results: Mutex<HashMap<String, IncrementalParseResult>>,
    pub fail_list_files: std::sync::atomic::AtomicBool,
}

impl FakeParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files(self, files: Vec<String>) -> Self {
        *self.files.lock() = files;
        self
    }

    pub fn seed(&self, file: impl Into<String>, result: ParseResult) {
        self.results.lock().insert(file.into(), result);
    }

    pub fn seed_incremental(&self, file: impl Into<String>, result: IncrementalParseResult) {
        self.incremental_results.lock().insert(file.into(), result);
    }
}

#[async_trait]
impl Parser for FakeParser {
    async fn parse_file(&self, path: &str) -> Result<ParseResult, AdapterError> {
        Ok(self.results.lock().get(path).cloned().unwrap_or_default())
    }

    async fn parse_file_incremental(&self, path: &str) -> Result<IncrementalParseResult, AdapterError> {
        self.incremental_results
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| AdapterError::Parse { file: path.into(), message: "no seeded result".into() })
    }

    async fn list_files(&self) -> Result<Vec<String>, AdapterError> {
        if self.fail_list_files.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AdapterError::Parse { file: String::new(), message: "listing failed".into() });
        }
        Ok(self.files.lock().clone())
    }
}

/// A module indexer that always succeeds, reporting a fixed module count.
pub struct FakeModuleIndexer {
    pub modules: u64,
}

impl Default for FakeModuleIndexer {
    fn default() -> Self {
        Self { modules: 1 }
    }
}

#[async_trait]
impl ModuleIndexer for FakeModuleIndexer {
    async fn index_root_package(&self) -> Result<u64, AdapterError> {
        Ok(self.modules)
    }
}

/// A Git provider returning a fixed commit for every path.
pub struct FakeGitProvider {
    pub commit: CommitInfo,
}

impl Default for FakeGitProvider {
    fn default() -> Self {
        Self {
            commit: CommitInfo {
                author: "test".into(),
                email: "test@example.com".into(),
                hash: "deadbeef".into(),
                date: "2026-01-01T00:00:00Z".into(),
            },
        }
    }
}

#[async_trait]
impl GitProvider for FakeGitProvider {
    async fn get_last_commit_info(&self, _path: &str) -> Result<CommitInfo, AdapterError> {
        Ok(self.commit.clone())
    }

    async fn get_unified_diff(&self, _path: &str, _context_lines: u32) -> Result<String, AdapterError> {
        Ok("@@ -1,1 +1,1 @@\n-old\n+new\n".into())
    }
}

#[cfg(test)]
#[path = "test_support_tests.rs"]
mod tests;
