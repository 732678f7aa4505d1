// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation Engine (C6, §4.1): the synchronization coordinator. Owns the
//! `SyncOperation` lifecycle — submission, a single-threaded FIFO queue
//! processor, the three sync flows, pause/resume/cancel, retry on
//! recoverable failure, and tuning.

mod full_sync;
mod incremental_sync;
mod partial_sync;
mod post_resolution;

use graphsync_adapters::{GitProvider, GraphStore, ModuleIndexer, Parser};
use graphsync_checkpoint::CheckpointRunner;
use graphsync_core::{
    Clock, EngineConfig, Event, OperationCounters, OperationOptions, OperationPayload, SyncError,
    SyncErrorKind, SyncOperation, SyncOperationStatus, SyncStatistics, TimestampCounterIdGen, Tuning,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Notify};

use crate::conflict_detector::ConflictDetector;
use crate::resolver::Resolver;
use crate::rollback::RollbackEngine;
use crate::sequence_tracker::SequenceTracker;

/// Raised at a cooperative checkpoint when the operation has been cancelled
/// (§4.1, §5). The only "thrown" signal in this translation — every other
/// failure mode is recorded as a [`SyncError`] and returned normally.
pub(crate) struct Cancelled;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("graph store is not ready")]
    NotReady,
}

struct EngineState {
    /// Operations that are queued or running.
    active: HashMap<String, SyncOperation>,
    /// Operations that finished as `completed`, `failed`, or `rolled_back`
    /// and were not cancelled (see `cancelled` below for that bucket).
    completed: HashMap<String, SyncOperation>,
    /// Dedicated bucket for cancelled operations so `getStatistics()` can
    /// count them once instead of matching both the cancelled and failed
    /// buckets of a status that is, underneath, just `Failed` (§8).
    cancelled: HashMap<String, SyncOperation>,
    queue: VecDeque<String>,
    cancelled_set: HashSet<String>,
    retry_scheduled: HashSet<String>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            active: HashMap::new(),
            completed: HashMap::new(),
            cancelled: HashMap::new(),
            queue: VecDeque::new(),
            cancelled_set: HashSet::new(),
            retry_scheduled: HashSet::new(),
        }
    }
}

struct Inner<C: Clock> {
    clock: C,
    config: EngineConfig,
    graph_store: Arc<dyn GraphStore>,
    parser: Arc<dyn Parser>,
    module_indexer: Arc<dyn ModuleIndexer>,
    git_provider: Arc<dyn GitProvider>,
    checkpoint_runner: Arc<CheckpointRunner>,
    resolver: Resolver,
    conflict_detector: ConflictDetector,
    rollback: RollbackEngine,
    sequence_tracker: Arc<SequenceTracker>,
    id_gen: TimestampCounterIdGen,
    events: broadcast::Sender<Event>,
    state: Mutex<EngineState>,
    paused: AtomicBool,
    resume_notify: Notify,
    processor_running: AtomicBool,
}

/// Handle to the Operation Engine. Cheap to clone — every clone shares the
/// same queue, state, and event stream, which is what lets the queue
/// processor and background retry/timeout tasks hold their own handle.
pub struct OperationEngine<C: Clock> {
    inner: Arc<Inner<C>>,
}

impl<C: Clock> Clone for OperationEngine<C> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<C: Clock + 'static> OperationEngine<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: C,
        config: EngineConfig,
        graph_store: Arc<dyn GraphStore>,
        parser: Arc<dyn Parser>,
        module_indexer: Arc<dyn ModuleIndexer>,
        git_provider: Arc<dyn GitProvider>,
        checkpoint_runner: Arc<CheckpointRunner>,
        sequence_tracker: Arc<SequenceTracker>,
    ) -> Self {
        let (events, _) = broadcast::channel(1024);
        let resolver = Resolver::new(graph_store.clone());
        let conflict_detector = ConflictDetector::new(graph_store.clone());
        let rollback = RollbackEngine::new(graph_store.clone());
        Self {
            inner: Arc::new(Inner {
                clock,
                config,
                graph_store,
                parser,
                module_indexer,
                git_provider,
                checkpoint_runner,
                resolver,
                conflict_detector,
                rollback,
                sequence_tracker,
                id_gen: TimestampCounterIdGen::new("op-"),
                events,
                state: Mutex::new(EngineState::new()),
                paused: AtomicBool::new(false),
                resume_notify: Notify::new(),
                processor_running: AtomicBool::new(false),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: Event) {
        let _ = self.inner.events.send(event);
    }

    // ---- public contract (§4.1) ----------------------------------------

    pub async fn start_full(&self, options: OperationOptions) -> Result<String, SubmitError> {
        self.submit(OperationPayload::Full, options).await
    }

    pub async fn start_incremental(
        &self,
        changes: Vec<graphsync_core::FileChange>,
        options: OperationOptions,
    ) -> Result<String, SubmitError> {
        self.submit(OperationPayload::Incremental { changes }, options).await
    }

    pub async fn start_partial(
        &self,
        updates: Vec<graphsync_core::PartialUpdate>,
        options: OperationOptions,
    ) -> Result<String, SubmitError> {
        self.submit(OperationPayload::Partial { updates }, options).await
    }

    /// `cancel(id) → bool` (§5): true for active/queued/retry-scheduled
    /// operations (mid-flight cancellation is observed cooperatively), and
    /// true as a no-op for an already-terminal operation; false only when
    /// `id` is entirely unknown.
    pub fn cancel(&self, operation_id: &str) -> bool {
        let mut state = self.inner.state.lock();
        if state.completed.contains_key(operation_id) || state.cancelled.contains_key(operation_id) {
            return true;
        }
        if state.active.contains_key(operation_id) || state.retry_scheduled.contains(operation_id) {
            state.cancelled_set.insert(operation_id.to_string());
            return true;
        }
        false
    }

    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
    }

    /// Idempotent: releases every cooperative checkpoint currently waiting
    /// and is a no-op if the engine was not paused (§8 round-trip law).
    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
        self.inner.resume_notify.notify_waiters();
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    /// `updateTuning(id, {maxConcurrency?, batchSize?}) → bool` (§4.1, §8).
    /// Non-finite inputs (`NaN`/`±Infinity`) are ignored rather than
    /// clamped; everything else is clamped into its documented bounds.
    pub fn update_tuning(&self, operation_id: &str, max_concurrency: Option<f64>, batch_size: Option<f64>) -> bool {
        let mut state = self.inner.state.lock();
        let Some(op) = state.active.get_mut(operation_id) else { return false };
        let current = op.tuning.unwrap_or(Tuning::clamped(
            self.inner.config.default_max_concurrency,
            self.inner.config.default_batch_size,
        ));
        let max_concurrency = max_concurrency
            .filter(|v| v.is_finite())
            .map(|v| v as u32)
            .unwrap_or(current.max_concurrency);
        let batch_size = batch_size.filter(|v| v.is_finite()).map(|v| v as u32).unwrap_or(current.batch_size);
        op.tuning = Some(Tuning::clamped(max_concurrency, batch_size));
        true
    }

    pub fn get_status(&self, operation_id: &str) -> Option<SyncOperation> {
        let state = self.inner.state.lock();
        state
            .active
            .get(operation_id)
            .or_else(|| state.completed.get(operation_id))
            .or_else(|| state.cancelled.get(operation_id))
            .cloned()
    }

    pub fn get_active(&self) -> Vec<SyncOperation> {
        self.inner.state.lock().active.values().cloned().collect()
    }

    pub fn get_queue_depth(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// `getStatistics()` (§8): `total == active + queued + completed +
    /// failed + cancelled`, with `retried` tracked separately.
    pub fn get_statistics(&self) -> SyncStatistics {
        let state = self.inner.state.lock();
        let mut stats = SyncStatistics::default();
        for op in state.active.values() {
            match op.bucket() {
                "active" => stats.active += 1,
                _ => stats.queued += 1,
            }
        }
        for op in state.completed.values() {
            match op.status {
                SyncOperationStatus::Completed => stats.completed += 1,
                _ => stats.failed += 1,
            }
            stats.retried += op.attempts as u64;
        }
        stats.cancelled = state.cancelled.len() as u64;
        stats.retried += state.cancelled.values().map(|op| op.attempts as u64).sum::<u64>();
        stats.total = stats.active + stats.queued + stats.completed + stats.failed + stats.cancelled;
        stats
    }

    // ---- submission scaffolding (§4.1 steps 1-6) ------------------------

    async fn submit(&self, payload: OperationPayload, options: OperationOptions) -> Result<String, SubmitError> {
        if !self.inner.graph_store.is_ready().await {
            return Err(SubmitError::NotReady);
        }

        let now = self.inner.clock.epoch_ms();
        let id = self.inner.id_gen.next(now);
        let mut op = SyncOperation::new(id.clone(), options.clone(), payload, now);

        if options.rollback_on_error {
            match self.inner.rollback.create_rollback_point(&id, "submit", &[]).await {
                Ok(point) => op.rollback_point = Some(point),
                Err(err) => {
                    op.status = SyncOperationStatus::Failed;
                    op.end_time = Some(now);
                    let error = SyncError::new(SyncErrorKind::Rollback, err.to_string(), now).with_recoverable(false);
                    op.errors.push(error.clone());
                    tracing::error!(operation_id = %id, error = %err, "rollback point creation failed, operation not enqueued");
                    self.inner.state.lock().completed.insert(id.clone(), op);
                    self.emit(Event::OperationFailed { operation_id: id.clone(), errors: vec![error] });
                    return Ok(id);
                }
            }
        }

        let timeout_ms = op.options.timeout_ms;
        {
            let mut state = self.inner.state.lock();
            state.active.insert(id.clone(), op);
            state.queue.push_back(id.clone());
        }
        self.emit(Event::OperationStarted { operation_id: id.clone() });
        tracing::info!(operation_id = %id, "operation submitted");

        self.arm_pending_timeout(id.clone(), Duration::from_millis(timeout_ms));
        self.kick_processor();
        Ok(id)
    }

    /// §4.1 step 5: forces `failed` with an `unknown` error if the
    /// operation is still `pending` (never dequeued) when the timer fires.
    fn arm_pending_timeout(&self, operation_id: String, timeout: Duration) {
        let engine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let mut state = engine.inner.state.lock();
            let Some(op) = state.active.get(&operation_id) else { return };
            if op.status != SyncOperationStatus::Pending {
                return;
            }
            let mut op = state.active.remove(&operation_id).unwrap();
            let now = engine.inner.clock.epoch_ms();
            op.status = SyncOperationStatus::Failed;
            op.end_time = Some(now);
            let error = SyncError::new(SyncErrorKind::Unknown, "pending timeout elapsed", now);
            op.errors.push(error.clone());
            state.queue.retain(|queued| queued != &operation_id);
            state.completed.insert(operation_id.clone(), op);
            drop(state);
            engine.emit(Event::OperationFailed { operation_id, errors: vec![error] });
        });
    }

    // ---- queue processor (§4.1, §5) -------------------------------------

    fn kick_processor(&self) {
        if self
            .inner
            .processor_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let engine = self.clone();
            tokio::spawn(async move { engine.drive_queue().await });
        }
    }

    async fn drive_queue(&self) {
        loop {
            self.wait_while_paused().await;

            let next = {
                let mut state = self.inner.state.lock();
                state.queue.pop_front()
            };
            let Some(operation_id) = next else {
                let mut state = self.inner.state.lock();
                if state.queue.is_empty() {
                    self.inner.processor_running.store(false, Ordering::SeqCst);
                    return;
                }
                continue;
            };

            let was_cancelled = {
                let mut state = self.inner.state.lock();
                state.cancelled_set.remove(&operation_id)
            };
            if was_cancelled {
                self.finalize_cancelled_while_queued(&operation_id);
                continue;
            }

            self.run_operation(&operation_id).await;
        }
    }

    async fn wait_while_paused(&self) {
        loop {
            let notified = self.inner.resume_notify.notified();
            if !self.inner.paused.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    fn finalize_cancelled_while_queued(&self, operation_id: &str) {
        let now = self.inner.clock.epoch_ms();
        let mut state = self.inner.state.lock();
        let Some(mut op) = state.active.remove(operation_id) else { return };
        op.status = SyncOperationStatus::Failed;
        op.end_time = Some(now);
        op.errors.push(SyncError::cancelled(now));
        state.cancelled.insert(operation_id.to_string(), op);
        drop(state);
        tracing::info!(operation_id, "operation cancelled while queued");
        self.emit(Event::OperationCancelled { operation_id: operation_id.to_string() });
    }

    async fn run_operation(&self, operation_id: &str) {
        {
            let mut state = self.inner.state.lock();
            let Some(op) = state.active.get_mut(operation_id) else { return };
            op.status = SyncOperationStatus::Running;
        }

        let payload = self.get_operation(operation_id).map(|op| op.payload.clone());
        let Some(payload) = payload else { return };

        let outcome = match payload {
            OperationPayload::Full => full_sync::run(self, operation_id).await,
            OperationPayload::Incremental { .. } => incremental_sync::run(self, operation_id).await,
            OperationPayload::Partial { .. } => partial_sync::run(self, operation_id).await,
        };

        self.finalize(operation_id, outcome).await;
    }

    async fn finalize(&self, operation_id: &str, outcome: Result<(), Cancelled>) {
        let now = self.inner.clock.epoch_ms();

        if outcome.is_err() {
            let mut state = self.inner.state.lock();
            let Some(mut op) = state.active.remove(operation_id) else { return };
            op.status = SyncOperationStatus::Failed;
            op.end_time = Some(now);
            op.errors.push(SyncError::cancelled(now));
            state.cancelled.insert(operation_id.to_string(), op);
            drop(state);
            tracing::info!(operation_id, "operation cancelled");
            self.emit(Event::OperationCancelled { operation_id: operation_id.to_string() });
            return;
        }

        let has_fatal = self.get_operation(operation_id).is_some_and(|op| graphsync_core::has_non_recoverable(&op.errors));

        if has_fatal {
            self.finalize_failed(operation_id, now).await;
        } else {
            self.finalize_success(operation_id, now);
        }
    }

    async fn finalize_failed(&self, operation_id: &str, now: u64) {
        let rollback_point = self.get_operation(operation_id).and_then(|op| op.rollback_point);
        let rollback_on_error = self.get_operation(operation_id).is_some_and(|op| op.options.rollback_on_error);

        if rollback_on_error {
            if let Some(point) = rollback_point {
                let outcome = self.inner.rollback.rollback_to_point(&point).await;
                self.mutate_operation(operation_id, |op| {
                    op.errors.extend(outcome.errors.iter().map(|e| {
                        SyncError::new(SyncErrorKind::Rollback, e.error.clone(), now).with_recoverable(e.recoverable)
                    }));
                });
                if outcome.success {
                    self.mutate_operation(operation_id, |op| op.status = SyncOperationStatus::RolledBack);
                    self.emit(Event::OperationRolledBack { operation_id: operation_id.to_string() });
                }
            }
        } else if let Some(point) = rollback_point {
            self.inner.rollback.delete_rollback_point(&point);
        }

        // A retry-bound operation stays parked in `active` (status untouched,
        // still `Running`) rather than moving to `completed`: per §4.1 a
        // retry-scheduled op is reinstated as active, not surfaced to callers
        // as a terminal failure. `fire_retry` mutates it in place once its
        // backoff elapses.
        if self.should_retry(operation_id) {
            let attempts = self.get_operation(operation_id).map(|op| op.attempts).unwrap_or(0);
            // A prior rollback may have already marked this terminal-looking;
            // undo that while the operation is still headed for another
            // attempt, so `is_terminal()` doesn't fire early for a watcher.
            self.mutate_operation(operation_id, |op| op.status = SyncOperationStatus::Running);
            tracing::info!(operation_id, attempts, "operation failed, scheduling retry");
            self.schedule_retry(operation_id.to_string());
            return;
        }

        let (errors, attempts) = {
            let mut state = self.inner.state.lock();
            let Some(mut op) = state.active.remove(operation_id) else { return };
            op.status = if op.status == SyncOperationStatus::RolledBack {
                SyncOperationStatus::RolledBack
            } else {
                SyncOperationStatus::Failed
            };
            op.end_time = Some(now);
            let errors = op.errors.clone();
            let attempts = op.attempts;
            state.completed.insert(operation_id.to_string(), op);
            (errors, attempts)
        };

        if attempts >= self.inner.config.retry.max_attempts {
            self.emit(Event::OperationAbandoned { operation_id: operation_id.to_string(), attempts });
        }
        tracing::warn!(operation_id, errors = errors.len(), "operation failed");
        self.emit(Event::OperationFailed { operation_id: operation_id.to_string(), errors });
    }

    fn finalize_success(&self, operation_id: &str, now: u64) {
        let rollback_point = self.get_operation(operation_id).and_then(|op| op.rollback_point);
        if let Some(point) = rollback_point {
            self.inner.rollback.delete_rollback_point(&point);
        }
        let mut state = self.inner.state.lock();
        let Some(mut op) = state.active.remove(operation_id) else { return };
        op.status = SyncOperationStatus::Completed;
        op.end_time = Some(now);
        state.completed.insert(operation_id.to_string(), op);
        drop(state);
        tracing::info!(operation_id, "operation completed");
        self.emit(Event::OperationCompleted { operation_id: operation_id.to_string() });
    }

    /// An operation retries only if at least one of its errors is marked
    /// recoverable and its attempts aren't exhausted (§4.1 retry policy, §7).
    /// `finalize_failed` only reaches here once `has_non_recoverable` already
    /// found a non-recoverable error among the set, so this is genuinely
    /// asking whether a *recoverable* one also exists, not just absence of
    /// an uncategorized one.
    fn should_retry(&self, operation_id: &str) -> bool {
        self.get_operation(operation_id).is_some_and(|op| {
            op.errors.iter().any(|e| e.recoverable) && !self.inner.config.retry.exhausted(op.attempts)
        })
    }

    /// §4.1 retry policy: geometric backoff `base * (attempts+1)`; on fire,
    /// resets lifecycle fields and reinstates the operation as active.
    fn schedule_retry(&self, operation_id: String) {
        let attempts = self.get_operation(&operation_id).map(|op| op.attempts).unwrap_or(0);
        {
            let mut state = self.inner.state.lock();
            state.retry_scheduled.insert(operation_id.clone());
        }
        let delay = self.inner.config.retry.delay_for(attempts);
        let engine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            engine.fire_retry(&operation_id).await;
        });
    }

    async fn fire_retry(&self, operation_id: &str) {
        let was_cancelled = {
            let mut state = self.inner.state.lock();
            state.retry_scheduled.remove(operation_id);
            state.cancelled_set.remove(operation_id)
        };
        if was_cancelled {
            self.finalize_cancelled_while_queued(operation_id);
            return;
        }

        let now = self.inner.clock.epoch_ms();
        let rollback_on_error = {
            let mut state = self.inner.state.lock();
            let Some(op) = state.active.get_mut(operation_id) else { return };
            op.attempts += 1;
            op.reset_for_retry(now);
            op.options.rollback_on_error
        };

        if rollback_on_error {
            match self.inner.rollback.create_rollback_point(operation_id, "retry", &[]).await {
                Ok(point) => self.mutate_operation(operation_id, |op| op.rollback_point = Some(point)),
                Err(err) => {
                    self.mutate_operation(operation_id, |op| {
                        op.errors.push(SyncError::new(SyncErrorKind::Rollback, err.to_string(), now).with_recoverable(false));
                    });
                }
            };
        }

        {
            let mut state = self.inner.state.lock();
            state.queue.push_back(operation_id.to_string());
        }
        tracing::info!(operation_id, "operation re-enqueued for retry");
        self.kick_processor();
    }

    // ---- shared helpers used by the flow modules ------------------------

    pub(crate) fn get_operation(&self, operation_id: &str) -> Option<SyncOperation> {
        self.inner.state.lock().active.get(operation_id).cloned()
    }

    pub(crate) fn mutate_operation<R>(&self, operation_id: &str, f: impl FnOnce(&mut SyncOperation) -> R) -> Option<R> {
        let mut state = self.inner.state.lock();
        state.active.get_mut(operation_id).map(f)
    }

    pub(crate) fn push_error(&self, operation_id: &str, error: SyncError) {
        self.mutate_operation(operation_id, |op| op.errors.push(error));
    }

    pub(crate) fn add_counters(&self, operation_id: &str, delta: impl FnOnce(&mut OperationCounters)) {
        self.mutate_operation(operation_id, |op| delta(&mut op.counters));
    }

    /// §5: the cooperative suspension point checked at every file/batch/
    /// change/update boundary. Blocks while paused; returns [`Cancelled`]
    /// once the operation has been marked for cancellation.
    pub(crate) async fn checkpoint(&self, operation_id: &str) -> Result<(), Cancelled> {
        self.wait_while_paused().await;
        let cancelled = self.inner.state.lock().cancelled_set.contains(operation_id);
        if cancelled {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    pub(crate) fn clock(&self) -> &C {
        &self.inner.clock
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub(crate) fn graph_store(&self) -> &Arc<dyn GraphStore> {
        &self.inner.graph_store
    }

    pub(crate) fn parser(&self) -> &Arc<dyn Parser> {
        &self.inner.parser
    }

    pub(crate) fn module_indexer(&self) -> &Arc<dyn ModuleIndexer> {
        &self.inner.module_indexer
    }

    pub(crate) fn git_provider(&self) -> &Arc<dyn GitProvider> {
        &self.inner.git_provider
    }

    pub(crate) fn checkpoint_runner(&self) -> &Arc<CheckpointRunner> {
        &self.inner.checkpoint_runner
    }

    pub(crate) fn resolver(&self) -> &Resolver {
        &self.inner.resolver
    }

    pub(crate) fn conflict_detector(&self) -> &ConflictDetector {
        &self.inner.conflict_detector
    }

    pub(crate) fn rollback(&self) -> &RollbackEngine {
        &self.inner.rollback
    }

    /// Extends the operation's rollback snapshot with pre-images for
    /// `entity_ids` just before they are written, if `rollback_on_error`
    /// created a point for this operation. No-op otherwise (§4.6, §8
    /// rollback round-trip law).
    pub(crate) async fn snapshot_for_rollback(&self, operation_id: &str, entity_ids: &[String]) {
        if entity_ids.is_empty() {
            return;
        }
        let Some(point) = self.get_operation(operation_id).and_then(|op| op.rollback_point) else { return };
        if let Err(err) = self.inner.rollback.snapshot_entities(&point, entity_ids).await {
            let now = self.inner.clock.epoch_ms();
            self.push_error(operation_id, SyncError::new(SyncErrorKind::Rollback, err.to_string(), now).with_recoverable(true));
        }
    }

    pub(crate) fn sequence_tracker(&self) -> &Arc<SequenceTracker> {
        &self.inner.sequence_tracker
    }

    pub(crate) fn events(&self) -> broadcast::Sender<Event> {
        self.inner.events.clone()
    }

    pub(crate) fn emit_progress(&self, operation_id: &str, phase: graphsync_core::SyncPhase, progress: f64) {
        self.emit(Event::SyncProgress {
            operation_id: operation_id.to_string(),
            progress: graphsync_core::SyncProgress { phase, progress },
        });
    }

    pub(crate) fn public_emit(&self, event: Event) {
        self.emit(event);
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
