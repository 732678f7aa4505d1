// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint Job Runner (C4, §4.5): a durable queue over
//! [`graphsync_core::CheckpointJob`] with retry/backoff, dead-letter
//! handling, and metrics.

use crate::error::EnqueueError;
use crate::event::CheckpointRunnerEvent;
use crate::metrics::CheckpointMetrics;
use graphsync_adapters::checkpoint_persistence::PersistedJob;
use graphsync_adapters::{CheckpointPersistence, GraphStore};
use graphsync_core::{CheckpointJob, CheckpointJobBuilder, CheckpointJobState, CheckpointReason};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Default max attempts before a job is dead-lettered (§4.5).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

struct SessionSequencer {
    next: Mutex<HashMap<String, u64>>,
}

impl SessionSequencer {
    fn new() -> Self {
        Self { next: Mutex::new(HashMap::new()) }
    }

    fn allocate(&self, session_id: &str) -> u64 {
        let mut guard = self.next.lock();
        let entry = guard.entry(session_id.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }
}

/// In-memory + optionally-durable job queue, the runner loop, and metrics.
pub struct CheckpointRunner {
    graph_store: Arc<dyn GraphStore>,
    persistence: Mutex<Option<Arc<dyn CheckpointPersistence>>>,
    queue: Mutex<VecDeque<CheckpointJob>>,
    dead_letter: Mutex<Vec<CheckpointJob>>,
    metrics: Mutex<CheckpointMetrics>,
    sequencer: SessionSequencer,
    max_attempts: AtomicU32,
    events: Option<mpsc::UnboundedSender<CheckpointRunnerEvent>>,
}

impl CheckpointRunner {
    pub fn new(graph_store: Arc<dyn GraphStore>) -> Self {
        Self {
            graph_store,
            persistence: Mutex::new(None),
            queue: Mutex::new(VecDeque::new()),
            dead_letter: Mutex::new(Vec::new()),
            metrics: Mutex::new(CheckpointMetrics::default()),
            sequencer: SessionSequencer::new(),
            max_attempts: AtomicU32::new(DEFAULT_MAX_ATTEMPTS),
            events: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = AtomicU32::new(max_attempts);
        self
    }

    /// Subscribe to job-lifecycle events (§4.5); returns the receiver.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<CheckpointRunnerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    fn emit(&self, event: CheckpointRunnerEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// `attachPersistence` (§4.5): promotes queued in-memory jobs into the
    /// store atomically; subsequent enqueues write through.
    pub async fn attach_persistence(&self, store: Arc<dyn CheckpointPersistence>) {
        let jobs: Vec<CheckpointJob> = self.queue.lock().iter().cloned().collect();
        for job in &jobs {
            let _ = store
                .put(PersistedJob {
                    job_id: job.job_id.as_str().to_string(),
                    state: job.state,
                    attempts: job.attempts,
                    payload: serde_json::to_value(job).unwrap_or(serde_json::Value::Null),
                    last_error: None,
                })
                .await;
        }
        *self.persistence.lock() = Some(store);
    }

    pub fn has_persistence(&self) -> bool {
        self.persistence.lock().is_some()
    }

    /// `enqueue(payload) → jobId` (§4.5): validates non-empty deduplicated
    /// seeds, assigns a monotonically increasing sequence number per
    /// session, and persists in `queued` state if a store is attached.
    pub async fn enqueue(
        &self,
        session_id: impl Into<String>,
        seed_entity_ids: Vec<String>,
        reason: CheckpointReason,
        triggered_by: impl Into<String>,
    ) -> Result<String, EnqueueError> {
        let session_id = session_id.into();
        let sequence_number = self.sequencer.allocate(&session_id);
        let job = CheckpointJobBuilder::new(session_id.clone(), seed_entity_ids, triggered_by)
            .reason(reason)
            .build(sequence_number)
            .ok_or(EnqueueError::EmptySeeds)?;

        let job_id = job.job_id.as_str().to_string();
        if let Some(store) = self.persistence.lock().clone() {
            let _ = store
                .put(PersistedJob {
                    job_id: job_id.clone(),
                    state: job.state,
                    attempts: job.attempts,
                    payload: serde_json::to_value(&job).unwrap_or(serde_json::Value::Null),
                    last_error: None,
                })
                .await;
        }
        self.queue.lock().push_back(job);
        self.metrics.lock().enqueued += 1;
        self.emit(CheckpointRunnerEvent::JobEnqueued { job_id: job_id.clone(), session_id });
        Ok(job_id)
    }

    /// Seed recovery on startup: load `queued` jobs from an attached store
    /// back onto the in-memory queue.
    pub async fn recover_from_persistence(&self) {
        let store = self.persistence.lock().clone();
        let Some(store) = store else { return };
        let Ok(queued) = store.list_queued().await else { return };
        let mut guard = self.queue.lock();
        for persisted in queued {
            if let Ok(job) = serde_json::from_value::<CheckpointJob>(persisted.payload) {
                guard.push_back(job);
            }
        }
    }

    /// Run every job queued *as of this call* exactly one attempt. A job
    /// re-queued after a recoverable failure is picked up on a later call
    /// to `run_once` rather than retried within the same pass — jobs for
    /// the same session still run in enqueue order since the queue is FIFO
    /// and single-worker. [`CheckpointRunner::backoff_for`] gives the delay
    /// [`CheckpointRunner::spawn_loop`]'s caller should leave between a
    /// failed attempt and the next `run_once` for that job; a caller
    /// driving `run_once` on a fixed poll interval shorter than the backoff
    /// will simply retry sooner than the nominal backoff window.
    pub async fn run_once(&self) {
        let pending = self.queue.lock().len();
        for _ in 0..pending {
            let job = { self.queue.lock().pop_front() };
            let Some(mut job) = job else { break };
            self.run_job(&mut job).await;
        }
    }

    async fn persist(&self, job: &CheckpointJob, last_error: Option<String>) {
        if let Some(store) = self.persistence.lock().clone() {
            let _ = store
                .put(PersistedJob {
                    job_id: job.job_id.as_str().to_string(),
                    state: job.state,
                    attempts: job.attempts,
                    payload: serde_json::to_value(job).unwrap_or(serde_json::Value::Null),
                    last_error,
                })
                .await;
        }
    }

    async fn run_job(&self, job: &mut CheckpointJob) {
        job.state = CheckpointJobState::Running;
        self.emit(CheckpointRunnerEvent::JobStarted { job_id: job.job_id.as_str().to_string() });
        self.persist(job, None).await;

        match self
            .graph_store
            .materialize_checkpoint(job.seed_entity_ids.clone(), job.hop_count)
            .await
        {
            Ok(checkpoint_id) => {
                job.state = CheckpointJobState::Completed;
                self.metrics.lock().completed += 1;
                self.persist(job, None).await;
                self.emit(CheckpointRunnerEvent::JobCompleted {
                    job_id: job.job_id.as_str().to_string(),
                    checkpoint_id,
                });
            }
            Err(err) => {
                job.attempts += 1;
                self.metrics.lock().failed += 1;
                self.emit(CheckpointRunnerEvent::JobAttemptFailed {
                    job_id: job.job_id.as_str().to_string(),
                    attempts: job.attempts,
                    error: err.to_string(),
                });
                if job.attempts < self.max_attempts.load(Ordering::SeqCst) {
                    self.metrics.lock().retries += 1;
                    job.state = CheckpointJobState::Queued;
                    self.persist(job, Some(err.to_string())).await;
                    self.queue.lock().push_back(job.clone());
                } else {
                    job.state = CheckpointJobState::DeadLetter;
                    self.metrics.lock().dead_lettered += 1;
                    self.persist(job, Some(err.to_string())).await;
                    self.dead_letter.lock().push(job.clone());
                    self.emit(CheckpointRunnerEvent::JobDeadLettered {
                        job_id: job.job_id.as_str().to_string(),
                    });
                }
            }
        }
    }

    /// Backoff delay before a retried job's next attempt (exponential,
    /// unlike the operation-level retry's geometric series — §4.5).
    pub fn backoff_for(attempts: u32) -> Duration {
        Duration::from_millis(500 * 2u64.saturating_pow(attempts))
    }

    pub fn metrics(&self) -> CheckpointMetrics {
        *self.metrics.lock()
    }

    pub fn dead_letter_jobs(&self) -> Vec<CheckpointJob> {
        self.dead_letter.lock().clone()
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.lock().len()
    }

    /// Drives [`CheckpointRunner::run_once`] on `poll_interval` until the
    /// runtime is shut down (§5: "runs its own independent loop"). Kept to
    /// a single worker — §4.5's per-session enqueue-order guarantee only
    /// holds as long as one driver owns the FIFO queue; run several
    /// `CheckpointRunner`s behind separate queues if more throughput is
    /// needed rather than spawning more of these.
    pub fn spawn_loop(self: Arc<Self>, poll_interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(poll_interval).await;
                self.run_once().await;
            }
        })
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
