// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conflict Detector/Resolver (C2, §4.3).

use graphsync_adapters::{AdapterError, Entity, GraphStore};
use graphsync_core::{
    diff_signature, Conflict, ConflictId, ConflictResolution, ConflictType, ConflictingValues,
    ResolutionStrategy,
};
use serde_json::Value;
use std::sync::Arc;

/// Fields considered volatile and stripped before diffing (§4.3: "ignored
/// volatile fields").
const VOLATILE_FIELDS: &[&str] = &["updatedAt", "lastModified", "version", "timestamp"];

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                if VOLATILE_FIELDS.contains(&key.as_str()) {
                    continue;
                }
                out.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

pub struct ConflictDetector {
    graph_store: Arc<dyn GraphStore>,
}

impl ConflictDetector {
    pub fn new(graph_store: Arc<dyn GraphStore>) -> Self {
        Self { graph_store }
    }

    /// Compares each incoming entity against the current graph, producing a
    /// `Conflict` for any that differ under the canonicalized diff.
    pub async fn detect_entity_conflicts(
        &self,
        entities: &[Entity],
        timestamp: u64,
    ) -> Result<Vec<Conflict>, AdapterError> {
        let mut conflicts = Vec::new();
        for incoming in entities {
            let Some(current) = self.graph_store.get_entity(&incoming.id).await? else { continue };
            let current_canon = canonicalize(&current.data);
            let incoming_canon = canonicalize(&incoming.data);
            if current_canon == incoming_canon {
                continue;
            }
            let diff = serde_json::json!({ "current": current_canon, "incoming": incoming_canon });
            let signature = diff_signature(ConflictType::EntityVersion, &incoming.id, &diff);
            conflicts.push(Conflict {
                id: ConflictId::new(),
                kind: ConflictType::EntityVersion,
                entity_id: Some(incoming.id.clone()),
                relationship_id: None,
                conflicting_values: ConflictingValues { current: current.data.clone(), incoming: incoming.data.clone() },
                diff,
                signature,
                timestamp,
                resolved: false,
                resolution: None,
                resolution_strategy: None,
            });
        }
        Ok(conflicts)
    }

    /// Same comparison for relationships, keyed by relationship id instead
    /// of entity id (`relationship_conflict`, §4.3).
    pub fn detect_relationship_conflict(
        &self,
        current: &graphsync_core::Relationship,
        incoming: &graphsync_core::Relationship,
        timestamp: u64,
    ) -> Option<Conflict> {
        if current.to_entity_id == incoming.to_entity_id && current.kind == incoming.kind {
            return None;
        }
        let diff = serde_json::json!({
            "current": { "toEntityId": current.to_entity_id, "type": current.kind },
            "incoming": { "toEntityId": incoming.to_entity_id, "type": incoming.kind },
        });
        let signature = diff_signature(ConflictType::RelationshipConflict, &incoming.id, &diff);
        Some(Conflict {
            id: ConflictId::new(),
            kind: ConflictType::RelationshipConflict,
            entity_id: None,
            relationship_id: Some(incoming.id.clone()),
            conflicting_values: ConflictingValues {
                current: serde_json::to_value(current).unwrap_or(Value::Null),
                incoming: serde_json::to_value(incoming).unwrap_or(Value::Null),
            },
            diff,
            signature,
            timestamp,
            resolved: false,
            resolution: None,
            resolution_strategy: None,
        })
    }
}

/// `resolveConflictsAuto(conflicts, strategy)` (§4.3): dispatches each
/// conflict to the first applicable strategy, in priority order.
pub struct ConflictResolver;

impl ConflictResolver {
    /// Priority-ordered `canHandle` checks. `overwrite` and `skip` always
    /// apply; `merge` only applies to entity-version conflicts where both
    /// sides are JSON objects (mergeable); anything else with
    /// `strategy=merge` falls through to `overwrite`.
    pub fn resolve_auto(
        conflict: &Conflict,
        strategy: ResolutionStrategy,
        timestamp: u64,
        resolved_by: impl Into<String>,
    ) -> ConflictResolution {
        let resolved_by = resolved_by.into();
        match strategy {
            ResolutionStrategy::Skip => ConflictResolution {
                strategy: ResolutionStrategy::Skip,
                resolved_value: None,
                manual_resolution: None,
                timestamp,
                resolved_by,
            },
            ResolutionStrategy::Merge
                if conflict.conflicting_values.current.is_object()
                    && conflict.conflicting_values.incoming.is_object() =>
            {
                let mut merged = conflict.conflicting_values.current.clone();
                if let (Value::Object(base), Value::Object(incoming)) =
                    (&mut merged, &conflict.conflicting_values.incoming)
                {
                    for (k, v) in incoming {
                        base.insert(k.clone(), v.clone());
                    }
                }
                ConflictResolution {
                    strategy: ResolutionStrategy::Merge,
                    resolved_value: Some(merged),
                    manual_resolution: None,
                    timestamp,
                    resolved_by,
                }
            }
            _ => ConflictResolution {
                strategy: ResolutionStrategy::Overwrite,
                resolved_value: Some(conflict.conflicting_values.incoming.clone()),
                manual_resolution: None,
                timestamp,
                resolved_by,
            },
        }
    }
}

#[cfg(test)]
#[path = "conflict_detector_tests.rs"]
mod tests;
