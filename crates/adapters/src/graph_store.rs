// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The property-graph/vector/relational store driver (consumed, §6).

use crate::error::AdapterError;
use crate::parser::Entity;
use async_trait::async_trait;
use graphsync_core::Relationship;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    #[serde(default)]
    pub skip_embedding: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkWriteOptions {
    #[serde(default)]
    pub skip_embedding: bool,
    #[serde(default)]
    pub validate: bool,
}

/// Outcome of a bulk write: when the bulk call itself fails, the caller
/// falls back to per-item writes (§4.1.1 steps 5/7) and this carries which
/// items actually made it through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityPatch {
    #[serde(default)]
    pub data: serde_json::Value,
}

/// The set of files observed by one operation, for `finalizeScan` (§9 /
/// SPEC_FULL C.1) — scoped to *this* operation rather than global.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanScope {
    pub files: Vec<String>,
    pub scan_start: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointAnnotation {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hop_count: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub triggered_by: String,
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn is_ready(&self) -> bool;

    async fn create_entity(&self, entity: Entity, opts: WriteOptions) -> Result<String, AdapterError>;
    async fn create_entities_bulk(
        &self,
        entities: Vec<Entity>,
        opts: BulkWriteOptions,
    ) -> Result<BulkOutcome, AdapterError>;
    async fn update_entity(
        &self,
        id: &str,
        patch: EntityPatch,
        opts: WriteOptions,
    ) -> Result<(), AdapterError>;
    async fn delete_entity(&self, id: &str) -> Result<(), AdapterError>;
    async fn get_entity(&self, id: &str) -> Result<Option<Entity>, AdapterError>;
    async fn get_entities_by_file(
        &self,
        path: &str,
        include_symbols: bool,
    ) -> Result<Vec<Entity>, AdapterError>;

    async fn create_relationship(
        &self,
        rel: Relationship,
        validate: bool,
    ) -> Result<String, AdapterError>;
    async fn create_relationships_bulk(
        &self,
        rels: Vec<Relationship>,
        opts: BulkWriteOptions,
    ) -> Result<BulkOutcome, AdapterError>;
    async fn open_edge(
        &self,
        from: &str,
        to: &str,
        kind: &str,
        at: u64,
        change_id: &str,
    ) -> Result<String, AdapterError>;
    async fn close_edge(
        &self,
        from: &str,
        to: &str,
        kind: &str,
        at: u64,
        change_id: &str,
    ) -> Result<(), AdapterError>;
    async fn upsert_edge_evidence_bulk(&self, rels: Vec<Relationship>) -> Result<(), AdapterError>;
    /// Removes a relationship entirely, used by the Rollback Engine (§4.6)
    /// to invert a `create_relationship` performed earlier in the operation.
    async fn delete_relationship(&self, id: &str) -> Result<(), AdapterError>;
    async fn append_version(
        &self,
        entity_id: &str,
        timestamp: u64,
        change_set_id: &str,
    ) -> Result<(), AdapterError>;

    async fn find_symbol_in_file(&self, path: &str, name: &str) -> Result<Vec<String>, AdapterError>;
    async fn find_nearby_symbols(
        &self,
        path: &str,
        name: &str,
        k: usize,
    ) -> Result<Vec<String>, AdapterError>;
    async fn find_symbol_by_kind_and_name(
        &self,
        kind: &str,
        name: &str,
    ) -> Result<Vec<String>, AdapterError>;
    async fn find_symbols_by_name(&self, name: &str) -> Result<Vec<String>, AdapterError>;

    /// Optional; absence surfaces as a `capability` error (§7).
    async fn create_embeddings_batch(&self, entity_ids: Vec<String>) -> Result<(), AdapterError> {
        let _ = entity_ids;
        Err(AdapterError::Capability { capability: "create_embeddings_batch".into() })
    }

    async fn finalize_scan(&self, scope: ScanScope) -> Result<(), AdapterError>;

    /// Materialize a checkpoint over `seed_entity_ids`, bounded by `hop_count`
    /// hops through the graph (§4.5); returns the resulting checkpoint id.
    async fn materialize_checkpoint(
        &self,
        seed_entity_ids: Vec<String>,
        hop_count: u8,
    ) -> Result<String, AdapterError>;

    async fn annotate_session_relationships_with_checkpoint(
        &self,
        session_id: &str,
        seeds: Vec<String>,
        annotation: CheckpointAnnotation,
    ) -> Result<(), AdapterError>;
}
