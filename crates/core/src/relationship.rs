// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relationship shape consumed by the engine and the Reference Resolver (C1).
//!
//! The graph store owns the authoritative relationship representation; this
//! is the minimum shape spec §3 requires the core to reason about.

use serde::{Deserialize, Serialize};

/// A structured endpoint reference awaiting resolution, or already resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EndpointRef {
    /// Already a concrete graph entity id.
    Entity { id: String },
    /// A symbol expected to live in a specific file.
    FileSymbol {
        file: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        symbol: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// A symbol with no known file, resolved by name alone.
    External { name: String },
}

impl EndpointRef {
    /// The symbol/name this ref is looking for, regardless of variant.
    pub fn name(&self) -> Option<&str> {
        match self {
            EndpointRef::Entity { .. } => None,
            EndpointRef::FileSymbol { symbol, name, .. } => {
                symbol.as_deref().or(name.as_deref())
            }
            EndpointRef::External { name } => Some(name),
        }
    }

    pub fn file(&self) -> Option<&str> {
        match self {
            EndpointRef::FileSymbol { file, .. } => Some(file),
            _ => None,
        }
    }
}

/// A unified-diff-derived before/after snippet pair attached to a critical
/// change (§4.1.2), length-capped by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalChange {
    pub before: String,
    pub after: String,
}

/// Describes the shift a modified entity underwent within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: String,
    pub to: String,
    pub verified_by: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_change: Option<CriticalChange>,
}

impl StateTransition {
    /// The default transition recorded for a modified entity (§4.1.2):
    /// unknown → working, manually verified, confidence 0.5.
    pub fn default_for_modification() -> Self {
        Self {
            from: "unknown".into(),
            to: "working".into(),
            verified_by: "manual".into(),
            confidence: 0.5,
            critical_change: None,
        }
    }
}

/// Severity of a `SESSION_IMPACTED` edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactSeverity {
    Low,
    Medium,
    High,
}

crate::simple_display! {
    ImpactSeverity {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

/// Describes the kind of change a `MODIFIED_IN`/`CREATED_IN`/`REMOVED_IN`
/// edge records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Modified,
    Created,
    Removed,
}

crate::simple_display! {
    ChangeKind {
        Modified => "modified",
        Created => "created",
        Removed => "removed",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeInfo {
    pub kind: ChangeKind,
    pub change_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_author: Option<String>,
}

/// Best-effort resolution metadata recorded on a relationship by C1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResolutionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_to: Option<ResolvedTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<ResolvedTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    pub id: String,
}

/// The minimum relationship shape the engine and resolver operate on; the
/// graph store owns richer fields beyond this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub from_entity_id: String,
    pub to_entity_id: String,
    pub created: u64,
    pub last_modified: u64,
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResolutionMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_info: Option<ChangeInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_transition: Option<StateTransition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<ImpactSeverity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_ref: Option<EndpointRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_ref: Option<EndpointRef>,
    #[serde(default)]
    pub ambiguous: bool,
    /// Source file tag attached during batch parsing (`__sourceFile`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

impl Relationship {
    /// Whether `toEntityId` was resolved through C1 and the invariant
    /// `metadata.resolvedTo.id == toEntityId` holds (§8 invariant).
    pub fn resolution_is_consistent(&self) -> bool {
        match self.metadata.as_ref().and_then(|m| m.resolved_to.as_ref()) {
            Some(resolved) => resolved.id == self.to_entity_id,
            None => true,
        }
    }
}

#[cfg(test)]
#[path = "relationship_tests.rs"]
mod tests;
