// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rollback Engine (C5, §4.6): captures a pre-operation snapshot of the
//! entities an operation is about to touch, then inverts whatever writes
//! actually happened — restoring or deleting entities, and deleting any
//! relationship created under the point — on failure.

use graphsync_adapters::{AdapterError, EntityPatch, GraphStore, WriteOptions};
use graphsync_core::RollbackPointId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One failed inversion step, preserved alongside the operation's other
/// errors (§4.6: "rollback errors are appended to the operation's error
/// list, preserving `recoverable` flags").
#[derive(Debug, Clone, PartialEq)]
pub struct RollbackError {
    pub action: &'static str,
    pub id: String,
    pub error: String,
    pub recoverable: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollbackOutcome {
    pub success: bool,
    pub errors: Vec<RollbackError>,
}

struct Snapshot {
    /// `entity_id -> pre-image`, `None` meaning the entity did not exist
    /// before the operation and should be deleted on rollback.
    entities: HashMap<String, Option<graphsync_adapters::Entity>>,
    /// Relationship ids created under this point, to be deleted on rollback.
    created_relationships: Vec<String>,
}

pub struct RollbackEngine {
    graph_store: Arc<dyn GraphStore>,
    points: Mutex<HashMap<RollbackPointId, Snapshot>>,
}

impl RollbackEngine {
    pub fn new(graph_store: Arc<dyn GraphStore>) -> Self {
        Self { graph_store, points: Mutex::new(HashMap::new()) }
    }

    /// `createRollbackPoint(opId, label) → rollbackId` (§4.6). `entity_ids`
    /// is every entity id the caller is about to write, known ahead of time
    /// from the batch/change list; their current state (or absence) is the
    /// pre-image restored on rollback.
    pub async fn create_rollback_point(
        &self,
        _operation_id: &str,
        _label: &str,
        entity_ids: &[String],
    ) -> Result<RollbackPointId, AdapterError> {
        let mut entities = HashMap::with_capacity(entity_ids.len());
        for id in entity_ids {
            let pre_image = self.graph_store.get_entity(id).await?;
            entities.insert(id.clone(), pre_image);
        }
        let id = RollbackPointId::new();
        self.points.lock().insert(id, Snapshot { entities, created_relationships: Vec::new() });
        Ok(id)
    }

    /// Registers a relationship created under `point` so it is undone on
    /// rollback. No-op if `point` is unknown (already rolled back/deleted).
    pub fn record_relationship_created(&self, point: &RollbackPointId, relationship_id: impl Into<String>) {
        if let Some(snapshot) = self.points.lock().get_mut(point) {
            snapshot.created_relationships.push(relationship_id.into());
        }
    }

    /// Lazily extends the snapshot with pre-images for `entity_ids` not
    /// already captured. The Operation Engine calls this just before
    /// writing each batch/change/update rather than up front, since the
    /// full set of entities an operation will touch is rarely known at
    /// `createRollbackPoint` time (full syncs discover it file by file).
    /// No-op if `point` is unknown.
    pub async fn snapshot_entities(&self, point: &RollbackPointId, entity_ids: &[String]) -> Result<(), AdapterError> {
        let missing: Vec<String> = {
            let points = self.points.lock();
            let Some(snapshot) = points.get(point) else { return Ok(()) };
            entity_ids.iter().filter(|id| !snapshot.entities.contains_key(id.as_str())).cloned().collect()
        };
        let mut fetched = Vec::with_capacity(missing.len());
        for id in missing {
            let pre_image = self.graph_store.get_entity(&id).await?;
            fetched.push((id, pre_image));
        }
        if let Some(snapshot) = self.points.lock().get_mut(point) {
            for (id, pre_image) in fetched {
                snapshot.entities.entry(id).or_insert(pre_image);
            }
        }
        Ok(())
    }

    /// `rollbackToPoint(rollbackId) → {success, errors}` (§4.6). Inverts
    /// every write: deletes relationships created under the point, then
    /// restores or deletes each snapshotted entity. Best-effort — each step
    /// failure is recorded rather than aborting the rest of the rollback.
    pub async fn rollback_to_point(&self, point: &RollbackPointId) -> RollbackOutcome {
        let snapshot = match self.points.lock().remove(point) {
            Some(s) => s,
            None => {
                return RollbackOutcome {
                    success: false,
                    errors: vec![RollbackError {
                        action: "lookup",
                        id: point.to_string(),
                        error: "unknown rollback point".into(),
                        recoverable: false,
                    }],
                }
            }
        };

        let mut errors = Vec::new();

        for relationship_id in &snapshot.created_relationships {
            if let Err(e) = self.graph_store.delete_relationship(relationship_id).await {
                errors.push(RollbackError {
                    action: "delete_relationship",
                    id: relationship_id.clone(),
                    error: e.to_string(),
                    recoverable: true,
                });
            }
        }

        for (entity_id, pre_image) in snapshot.entities {
            let result = match pre_image {
                Some(entity) => {
                    self.graph_store
                        .update_entity(&entity_id, EntityPatch { data: entity.data }, WriteOptions::default())
                        .await
                }
                None => self.graph_store.delete_entity(&entity_id).await,
            };
            if let Err(e) = result {
                errors.push(RollbackError {
                    action: "restore_entity",
                    id: entity_id,
                    error: e.to_string(),
                    recoverable: true,
                });
            }
        }

        RollbackOutcome { success: errors.is_empty(), errors }
    }

    /// `deleteRollbackPoint(rollbackId)` (§4.6): best-effort cleanup on
    /// success, swallows an unknown point.
    pub fn delete_rollback_point(&self, point: &RollbackPointId) {
        self.points.lock().remove(point);
    }

    pub fn has_point(&self, point: &RollbackPointId) -> bool {
        self.points.lock().contains_key(point)
    }
}

#[cfg(test)]
#[path = "rollback_tests.rs"]
mod tests;
