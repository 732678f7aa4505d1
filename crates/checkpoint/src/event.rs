// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job-lifecycle events the runner raises internally (§4.5). These are
//! distinct from the externally emitted events of spec §6
//! (`checkpoint_scheduled`/`checkpoint_schedule_failed`/
//! `checkpoint_metrics_updated`) — a coordinator bridges the two, the way
//! `graphsync-engine` translates runner activity into the public event
//! stream.

#[derive(Debug, Clone, PartialEq)]
pub enum CheckpointRunnerEvent {
    JobEnqueued { job_id: String, session_id: String },
    JobStarted { job_id: String },
    JobCompleted { job_id: String, checkpoint_id: String },
    JobAttemptFailed { job_id: String, attempts: u32, error: String },
    JobDeadLettered { job_id: String },
}

impl CheckpointRunnerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CheckpointRunnerEvent::JobEnqueued { .. } => "job_enqueued",
            CheckpointRunnerEvent::JobStarted { .. } => "job_started",
            CheckpointRunnerEvent::JobCompleted { .. } => "job_completed",
            CheckpointRunnerEvent::JobAttemptFailed { .. } => "job_attempt_failed",
            CheckpointRunnerEvent::JobDeadLettered { .. } => "job_dead_lettered",
        }
    }
}
