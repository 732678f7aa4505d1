// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conflict records produced by the Conflict Detector/Resolver (C2).

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

crate::define_id! {
    /// Opaque identifier for a detected conflict.
    pub struct ConflictId("cfl-");
}

/// Classification of a detected conflict, per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    EntityVersion,
    EntityDeletion,
    RelationshipConflict,
    ConcurrentModification,
}

crate::simple_display! {
    ConflictType {
        EntityVersion => "entity_version",
        EntityDeletion => "entity_deletion",
        RelationshipConflict => "relationship_conflict",
        ConcurrentModification => "concurrent_modification",
    }
}

/// How a conflict was or should be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    Overwrite,
    Merge,
    Skip,
    Manual,
}

crate::simple_display! {
    ResolutionStrategy {
        Overwrite => "overwrite",
        Merge => "merge",
        Skip => "skip",
        Manual => "manual",
    }
}

/// The outcome of resolving a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub strategy: ResolutionStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_resolution: Option<String>,
    pub timestamp: u64,
    pub resolved_by: String,
}

/// The current-vs-incoming values a conflict was detected over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictingValues {
    pub current: serde_json::Value,
    pub incoming: serde_json::Value,
}

/// One detected conflict between incoming and current graph state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: ConflictId,
    #[serde(rename = "type")]
    pub kind: ConflictType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_id: Option<String>,
    pub conflicting_values: ConflictingValues,
    pub diff: serde_json::Value,
    /// Deterministic over the canonicalized diff, so repeated detections of
    /// the same logical conflict upsert instead of duplicating.
    pub signature: String,
    pub timestamp: u64,
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ConflictResolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_strategy: Option<ResolutionStrategy>,
}

impl Conflict {
    /// `resolved=true ⇒ resolution` must be present (§3 invariant).
    pub fn is_valid(&self) -> bool {
        !self.resolved || self.resolution.is_some()
    }

    pub fn mark_resolved(&mut self, resolution: ConflictResolution) {
        self.resolution_strategy = Some(resolution.strategy);
        self.resolved = true;
        self.resolution = Some(resolution);
    }
}

/// Compute a stable signature over a canonicalized diff so that repeated
/// detections of the same logical conflict dedupe by signature (§3, §8).
///
/// `canonical_diff` must already have volatile fields stripped and field
/// ordering normalized by the caller (the Conflict Detector); this function
/// only hashes the serialized form.
pub fn diff_signature(kind: ConflictType, target_id: &str, canonical_diff: &serde_json::Value) -> String {
    let mut hasher = Sha1::new();
    hasher.update(kind.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(target_id.as_bytes());
    hasher.update(b"|");
    // `to_string` on a `serde_json::Value` built with sorted keys is stable;
    // canonicalization of key order is the detector's responsibility.
    hasher.update(canonical_diff.to_string().as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
#[path = "conflict_tests.rs"]
mod tests;
