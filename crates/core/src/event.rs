// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events emitted by the engine (§6) and the session stream (§4.7).

use crate::conflict::Conflict;
use crate::errors::SyncError;
use serde::{Deserialize, Serialize};

/// Progress phase tag attached to `syncProgress` events (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Parsing,
    ResolvingRelationships,
    Completed,
}

crate::simple_display! {
    SyncPhase {
        Parsing => "parsing",
        ResolvingRelationships => "resolving_relationships",
        Completed => "completed",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub phase: SyncPhase,
    /// In `[0, 1]`.
    pub progress: f64,
}

/// Health state rolled up by the Monitoring Sink (C8, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

crate::simple_display! {
    HealthState {
        Healthy => "healthy",
        Degraded => "degraded",
        Unhealthy => "unhealthy",
    }
}

/// The kind of a [`SessionStreamEvent`] (§3, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStreamEventType {
    SessionStarted,
    SessionKeepalive,
    SessionRelationships,
    SessionCheckpoint,
    SessionTeardown,
}

crate::simple_display! {
    SessionStreamEventType {
        SessionStarted => "session_started",
        SessionKeepalive => "session_keepalive",
        SessionRelationships => "session_relationships",
        SessionCheckpoint => "session_checkpoint",
        SessionTeardown => "session_teardown",
    }
}

/// A structured event on the per-session stream (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStreamEvent {
    #[serde(rename = "type")]
    pub kind: SessionStreamEventType,
    pub session_id: String,
    pub operation_id: String,
    /// ISO 8601 timestamp.
    pub timestamp: String,
    pub payload: serde_json::Value,
}

/// Top-level events emitted by the engine and its subsystems (§6).
///
/// Serializes as `{"event": "operation_started", ...}`, mirroring the
/// teacher's tag-on-enum event shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    OperationStarted { operation_id: String },
    OperationCompleted { operation_id: String },
    OperationFailed { operation_id: String, errors: Vec<SyncError> },
    OperationCancelled { operation_id: String },
    OperationRolledBack { operation_id: String },
    OperationAbandoned { operation_id: String, attempts: u32 },
    SyncProgress { operation_id: String, progress: SyncProgress },
    ConflictDetected { operation_id: String, conflict: Conflict },
    ConflictsDetected { operation_id: String, conflicts: Vec<Conflict> },
    SessionEvent { event: SessionStreamEvent },
    SessionSequenceAnomaly {
        session_id: String,
        reason: crate::session::AnomalyReason,
        event_type: String,
        sequence: u64,
        previous_sequence: u64,
    },
    CheckpointScheduled { job_id: String, session_id: String },
    CheckpointScheduleFailed { session_id: String, error: String },
    CheckpointMetricsUpdated { enqueued: u64, completed: u64, failed: u64, retries: u64 },
    HealthCheck { state: HealthState },
    AlertTriggered { message: String, state: HealthState },
    LogEntry { level: String, message: String },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::OperationStarted { .. } => "operation_started",
            Event::OperationCompleted { .. } => "operation_completed",
            Event::OperationFailed { .. } => "operation_failed",
            Event::OperationCancelled { .. } => "operation_cancelled",
            Event::OperationRolledBack { .. } => "operation_rolled_back",
            Event::OperationAbandoned { .. } => "operation_abandoned",
            Event::SyncProgress { .. } => "sync_progress",
            Event::ConflictDetected { .. } => "conflict_detected",
            Event::ConflictsDetected { .. } => "conflicts_detected",
            Event::SessionEvent { .. } => "session_event",
            Event::SessionSequenceAnomaly { .. } => "session_sequence_anomaly",
            Event::CheckpointScheduled { .. } => "checkpoint_scheduled",
            Event::CheckpointScheduleFailed { .. } => "checkpoint_schedule_failed",
            Event::CheckpointMetricsUpdated { .. } => "checkpoint_metrics_updated",
            Event::HealthCheck { .. } => "health_check",
            Event::AlertTriggered { .. } => "alert_triggered",
            Event::LogEntry { .. } => "log_entry",
        }
    }

    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            Event::OperationStarted { operation_id }
            | Event::OperationCompleted { operation_id }
            | Event::OperationCancelled { operation_id }
            | Event::OperationRolledBack { operation_id } => format!("{t} id={operation_id}"),
            Event::OperationFailed { operation_id, errors } => {
                format!("{t} id={operation_id} errors={}", errors.len())
            }
            Event::OperationAbandoned { operation_id, attempts } => {
                format!("{t} id={operation_id} attempts={attempts}")
            }
            Event::SyncProgress { operation_id, progress } => {
                format!("{t} id={operation_id} phase={} progress={:.2}", progress.phase, progress.progress)
            }
            Event::ConflictDetected { operation_id, conflict } => {
                format!("{t} id={operation_id} conflict={}", conflict.id)
            }
            Event::ConflictsDetected { operation_id, conflicts } => {
                format!("{t} id={operation_id} count={}", conflicts.len())
            }
            Event::SessionEvent { event } => format!("{t} session={} kind={}", event.session_id, event.kind),
            Event::SessionSequenceAnomaly { session_id, reason, .. } => {
                format!("{t} session={session_id} reason={reason}")
            }
            Event::CheckpointScheduled { job_id, session_id } => {
                format!("{t} job={job_id} session={session_id}")
            }
            Event::CheckpointScheduleFailed { session_id, error } => {
                format!("{t} session={session_id} error={error}")
            }
            Event::CheckpointMetricsUpdated { enqueued, completed, failed, retries } => {
                format!("{t} enqueued={enqueued} completed={completed} failed={failed} retries={retries}")
            }
            Event::HealthCheck { state } => format!("{t} state={state}"),
            Event::AlertTriggered { message, state } => format!("{t} state={state} msg={message}"),
            Event::LogEntry { level, message } => format!("{t} level={level} msg={message}"),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
