// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sync operation lifecycle record (C6 data model, §3-§4.1).
//!
//! Per the redesign flag in spec §9, the heterogeneous payload the original
//! system threads onto the operation record (`changes`, `updates`,
//! `_batchEntities`, `_batchRelationships`, `_embedQueue`, ...) is split
//! here: [`SyncOperation`] only ever holds the *input* payload needed to
//! retry ([`OperationPayload`]) plus the counters/errors/conflicts produced
//! so far. Per-batch working buffers belong to the worker executing a flow,
//! never to this shared record.

use crate::conflict::Conflict;
use crate::errors::SyncError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    /// Opaque identifier for a rollback snapshot, owned by the operation
    /// that created it.
    pub struct RollbackPointId("rbp-");
}

/// Kind of sync request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperationType {
    Full,
    Incremental,
    Partial,
}

crate::simple_display! {
    SyncOperationType {
        Full => "full",
        Incremental => "incremental",
        Partial => "partial",
    }
}

/// Lifecycle status of a sync operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    RolledBack,
}

crate::simple_display! {
    SyncOperationStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        RolledBack => "rolled_back",
    }
}

impl SyncOperationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SyncOperationStatus::Completed
                | SyncOperationStatus::Failed
                | SyncOperationStatus::RolledBack
        )
    }
}

/// How detected conflicts should be resolved during a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolutionMode {
    Overwrite,
    Merge,
    Skip,
    Manual,
}

crate::simple_display! {
    ConflictResolutionMode {
        Overwrite => "overwrite",
        Merge => "merge",
        Skip => "skip",
        Manual => "manual",
    }
}

/// Default pending-timeout, per §4.1 step 5.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Options shared by all three submission flows (§4.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationOptions {
    #[serde(default)]
    pub rollback_on_error: bool,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub conflict_resolution: ConflictResolutionMode,
    #[serde(default)]
    pub include_embeddings: bool,
    #[serde(default)]
    pub max_concurrency: Option<u32>,
    #[serde(default)]
    pub batch_size: Option<u32>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for ConflictResolutionMode {
    fn default() -> Self {
        ConflictResolutionMode::Overwrite
    }
}

impl Default for OperationOptions {
    fn default() -> Self {
        Self {
            rollback_on_error: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            conflict_resolution: ConflictResolutionMode::default(),
            include_embeddings: false,
            max_concurrency: None,
            batch_size: None,
        }
    }
}

impl OperationOptions {
    crate::setters! {
        set { rollback_on_error: bool, timeout_ms: u64, conflict_resolution: ConflictResolutionMode, include_embeddings: bool }
        option { max_concurrency: u32, batch_size: u32 }
    }
}

/// A single file-level change for an incremental sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Create,
    Modify,
    Delete,
}

crate::simple_display! {
    ChangeType {
        Create => "create",
        Modify => "modify",
        Delete => "delete",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    pub file: String,
    #[serde(rename = "type")]
    pub kind: ChangeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_id: Option<String>,
}

/// A single entity-level update for a partial sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialUpdateType {
    Create,
    Update,
    Delete,
}

crate::simple_display! {
    PartialUpdateType {
        Create => "create",
        Update => "update",
        Delete => "delete",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialUpdate {
    pub entity_id: String,
    #[serde(rename = "type")]
    pub kind: PartialUpdateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<serde_json::Value>,
}

/// The tagged input payload for one operation — replaces the loose
/// `changes`/`updates` attributes the original system hangs off the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationPayload {
    Full,
    Incremental { changes: Vec<FileChange> },
    Partial { updates: Vec<PartialUpdate> },
}

impl OperationPayload {
    pub fn operation_type(&self) -> SyncOperationType {
        match self {
            OperationPayload::Full => SyncOperationType::Full,
            OperationPayload::Incremental { .. } => SyncOperationType::Incremental,
            OperationPayload::Partial { .. } => SyncOperationType::Partial,
        }
    }
}

/// Per-operation entity/relationship counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationCounters {
    pub files_processed: u64,
    pub entities_created: u64,
    pub entities_updated: u64,
    pub entities_deleted: u64,
    pub relationships_created: u64,
    pub relationships_updated: u64,
    pub relationships_deleted: u64,
}

/// Per-operation tuning, adjustable mid-flight via `updateTuning` and
/// applied at the next batch boundary (§3, §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tuning {
    pub max_concurrency: u32,
    pub batch_size: u32,
}

pub const MAX_CONCURRENCY_MIN: u32 = 1;
pub const MAX_CONCURRENCY_MAX: u32 = 64;
pub const BATCH_SIZE_MIN: u32 = 1;
pub const BATCH_SIZE_MAX: u32 = 5000;

impl Tuning {
    /// Clamp both fields into their documented bounds. Non-finite floats are
    /// the caller's problem before this point (inputs here are already
    /// integers); `updateTuning` callers are expected to have discarded
    /// non-finite values before constructing this.
    pub fn clamped(max_concurrency: u32, batch_size: u32) -> Self {
        Self {
            max_concurrency: max_concurrency.clamp(MAX_CONCURRENCY_MIN, MAX_CONCURRENCY_MAX),
            batch_size: batch_size.clamp(BATCH_SIZE_MIN, BATCH_SIZE_MAX),
        }
    }
}

/// The full lifecycle record for one sync request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOperation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SyncOperationType,
    pub status: SyncOperationStatus,
    pub start_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<u64>,
    #[serde(default)]
    pub counters: OperationCounters,
    #[serde(default)]
    pub errors: Vec<SyncError>,
    #[serde(default)]
    pub conflicts: Vec<Conflict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_point: Option<RollbackPointId>,
    pub options: OperationOptions,
    pub payload: OperationPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuning: Option<Tuning>,
    #[serde(default)]
    pub attempts: u32,
}

impl SyncOperation {
    pub fn new(id: impl Into<String>, options: OperationOptions, payload: OperationPayload, start_time: u64) -> Self {
        let kind = payload.operation_type();
        Self {
            id: id.into(),
            kind,
            status: SyncOperationStatus::Pending,
            start_time,
            end_time: None,
            counters: OperationCounters::default(),
            errors: Vec::new(),
            conflicts: Vec::new(),
            rollback_point: None,
            options,
            payload,
            tuning: None,
            attempts: 0,
        }
    }

    /// Effective max concurrency for the next batch boundary: tuning
    /// overrides options, which overrides the documented default, clamped.
    pub fn effective_tuning(&self, default_batch_size: u32, default_max_concurrency: u32) -> Tuning {
        let batch_size = self
            .tuning
            .map(|t| t.batch_size)
            .or(self.options.batch_size)
            .unwrap_or(default_batch_size);
        let max_concurrency = self
            .tuning
            .map(|t| t.max_concurrency)
            .or(self.options.max_concurrency)
            .unwrap_or(default_max_concurrency);
        let batch_size = batch_size.clamp(BATCH_SIZE_MIN, BATCH_SIZE_MAX);
        let max_concurrency = max_concurrency.clamp(MAX_CONCURRENCY_MIN, batch_size.max(1));
        Tuning { max_concurrency, batch_size }
    }

    /// Merge freshly detected conflicts into `self.conflicts`, keyed by
    /// [`Conflict::signature`] (§8: "re-detection upserts, no duplicates").
    /// An incoming conflict replaces an existing entry with the same
    /// signature rather than appending alongside it.
    pub fn upsert_conflicts(&mut self, incoming: Vec<Conflict>) {
        for conflict in incoming {
            match self.conflicts.iter_mut().find(|existing| existing.signature == conflict.signature) {
                Some(existing) => *existing = conflict,
                None => self.conflicts.push(conflict),
            }
        }
    }

    pub fn reset_for_retry(&mut self, start_time: u64) {
        self.status = SyncOperationStatus::Pending;
        self.start_time = start_time;
        self.end_time = None;
        self.errors.clear();
        self.conflicts.clear();
        self.counters = OperationCounters::default();
    }

    /// `getStatistics().total == active + queued + completed + failed +
    /// cancelled` invariant helper (§8) — counts this operation into exactly
    /// one bucket of a running tally.
    pub fn bucket(&self) -> &'static str {
        match self.status {
            SyncOperationStatus::Pending => "queued",
            SyncOperationStatus::Running => "active",
            SyncOperationStatus::Completed => "completed",
            SyncOperationStatus::Failed => "failed",
            SyncOperationStatus::RolledBack => "failed",
        }
    }
}

/// Aggregate counts returned by `getStatistics()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatistics {
    pub total: u64,
    pub active: u64,
    pub queued: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub retried: u64,
}

pub type OperationMap = HashMap<String, SyncOperation>;

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
