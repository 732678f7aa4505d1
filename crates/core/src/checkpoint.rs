// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint job record — the durable unit of work queued by the engine
//! and executed by the Checkpoint Job Runner (C4).

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Identifier for a checkpoint job.
    pub struct CheckpointJobId("job-");
}

/// Why a checkpoint was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointReason {
    Daily,
    Incident,
    Manual,
}

crate::simple_display! {
    CheckpointReason {
        Daily => "daily",
        Incident => "incident",
        Manual => "manual",
    }
}

/// Lifecycle state of a checkpoint job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointJobState {
    Queued,
    Running,
    Completed,
    Failed,
    DeadLetter,
}

crate::simple_display! {
    CheckpointJobState {
        Queued => "queued",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        DeadLetter => "dead_letter",
    }
}

/// Hop count bounds for a checkpoint's bounded-neighborhood materialization.
pub const HOP_COUNT_MIN: u8 = 1;
pub const HOP_COUNT_MAX: u8 = 5;

/// Clamp a requested hop count into `[HOP_COUNT_MIN, HOP_COUNT_MAX]`.
pub fn clamp_hop_count(hop_count: u8) -> u8 {
    hop_count.clamp(HOP_COUNT_MIN, HOP_COUNT_MAX)
}

/// A durable unit of checkpoint work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointJob {
    pub job_id: CheckpointJobId,
    pub session_id: String,
    /// Deduplicated, non-empty (§3 invariant) set of entities whose
    /// neighborhood should be materialized.
    pub seed_entity_ids: Vec<String>,
    pub reason: CheckpointReason,
    pub hop_count: u8,
    pub sequence_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<serde_json::Value>,
    pub triggered_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    pub attempts: u32,
    pub state: CheckpointJobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Builder enforcing the seed-id dedup/non-empty invariant and hop-count
/// clamp before a job is ever constructed.
pub struct CheckpointJobBuilder {
    session_id: String,
    seed_entity_ids: Vec<String>,
    reason: CheckpointReason,
    hop_count: u8,
    triggered_by: String,
    operation_id: Option<String>,
    event_id: Option<String>,
    actor: Option<String>,
    annotations: Option<serde_json::Value>,
    window: Option<String>,
}

impl CheckpointJobBuilder {
    pub fn new(session_id: impl Into<String>, seed_entity_ids: Vec<String>, triggered_by: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            seed_entity_ids,
            reason: CheckpointReason::Manual,
            hop_count: 2,
            triggered_by: triggered_by.into(),
            operation_id: None,
            event_id: None,
            actor: None,
            annotations: None,
            window: None,
        }
    }

    crate::setters! {
        set { reason: CheckpointReason, hop_count: u8 }
        option { operation_id: String, event_id: String, actor: String, window: String }
    }

    pub fn annotations(mut self, v: serde_json::Value) -> Self {
        self.annotations = Some(v);
        self
    }

    /// Returns `None` if `seed_entity_ids` is empty after deduplication
    /// (spec's `seedEntityIds` non-empty invariant).
    pub fn build(self, sequence_number: u64) -> Option<CheckpointJob> {
        let mut seen = std::collections::HashSet::new();
        let seed_entity_ids: Vec<String> = self
            .seed_entity_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        if seed_entity_ids.is_empty() {
            return None;
        }
        Some(CheckpointJob {
            job_id: CheckpointJobId::new(),
            session_id: self.session_id,
            seed_entity_ids,
            reason: self.reason,
            hop_count: clamp_hop_count(self.hop_count),
            sequence_number,
            operation_id: self.operation_id,
            event_id: self.event_id,
            actor: self.actor,
            annotations: self.annotations,
            triggered_by: self.triggered_by,
            window: self.window,
            attempts: 0,
            state: CheckpointJobState::Queued,
            last_error: None,
        })
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
