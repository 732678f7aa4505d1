// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitoring Sink (C8, §4.8): consumes the engine's broadcast [`Event`]
//! stream and the Checkpoint Job Runner's metrics, rolling both up into the
//! aggregate view `getMetrics()`/`getHealth()` expose.
//!
//! Unlike C1-C7, nothing here is on the write path of an operation — a lost
//! or lagged event only degrades what the sink reports, never the operation
//! itself (§4.8: "observability must never affect operation outcomes").

use graphsync_checkpoint::CheckpointMetrics;
use graphsync_core::{Clock, Event, HealthState};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const ALERT_CAP: usize = 100;
const LOG_CAP: usize = 1000;
const SEQUENCE_ANOMALY_CAP: usize = 100;
const THROUGHPUT_WINDOW: Duration = Duration::from_secs(300);
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);
const UNHEALTHY_THRESHOLD: u32 = 3;

#[derive(Debug, Clone)]
pub struct Alert {
    pub message: String,
    pub state: HealthState,
    pub at_epoch_ms: u64,
}

#[derive(Debug, Clone)]
pub struct LogLine {
    pub level: String,
    pub message: String,
    pub at_epoch_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SequenceAnomalyRecord {
    pub session_id: String,
    pub reason: graphsync_core::AnomalyReason,
    pub event_type: String,
    pub sequence: u64,
    pub previous_sequence: u64,
    pub at_epoch_ms: u64,
}

/// Per-operation phase snapshot, updated from `sync_progress` events.
#[derive(Debug, Clone, Default)]
pub struct OperationPhase {
    pub phase: Option<String>,
    pub progress: f64,
}

#[derive(Debug, Clone, Default)]
struct OperationSnapshot {
    entities_touched: u64,
    relationships_touched: u64,
    outcome: Option<&'static str>,
    duration_ms: Option<u64>,
}

#[derive(Default)]
struct MetricTotals {
    operations_total: u64,
    operations_successful: u64,
    operations_failed: u64,
    total_entities_processed: u64,
    total_relationships_processed: u64,
    /// Completed-operation durations, for the running average.
    durations_ms: VecDeque<u64>,
}

/// A single completion timestamp, for the 5-minute throughput window.
struct Completion {
    at_epoch_ms: u64,
}

struct Inner {
    operations: Mutex<HashMap<String, OperationSnapshot>>,
    phases: Mutex<HashMap<String, OperationPhase>>,
    alerts: Mutex<VecDeque<Alert>>,
    logs: Mutex<VecDeque<LogLine>>,
    sequence_anomalies: Mutex<VecDeque<SequenceAnomalyRecord>>,
    totals: Mutex<MetricTotals>,
    completions: Mutex<VecDeque<Completion>>,
    duplicate_count: AtomicU64,
    out_of_order_count: AtomicU64,
    consecutive_failures: AtomicU64,
    checkpoint_metrics: Mutex<CheckpointMetrics>,
    last_health_state: Mutex<HealthState>,
    running: AtomicBool,
}

/// Observes the engine's event stream and produces the rolled-up
/// `getMetrics()`/`getHealth()` view (§4.8). Cheap to clone; every clone
/// shares the same underlying state.
#[derive(Clone)]
pub struct MonitoringSink<C: Clock> {
    inner: Arc<Inner>,
    clock: C,
    events: broadcast::Sender<Event>,
    health_timer: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl<C: Clock + 'static> MonitoringSink<C> {
    pub fn new(clock: C, events: broadcast::Sender<Event>) -> Self {
        Self {
            inner: Arc::new(Inner {
                operations: Mutex::new(HashMap::new()),
                phases: Mutex::new(HashMap::new()),
                alerts: Mutex::new(VecDeque::new()),
                logs: Mutex::new(VecDeque::new()),
                sequence_anomalies: Mutex::new(VecDeque::new()),
                totals: Mutex::new(MetricTotals::default()),
                completions: Mutex::new(VecDeque::new()),
                duplicate_count: AtomicU64::new(0),
                out_of_order_count: AtomicU64::new(0),
                consecutive_failures: AtomicU64::new(0),
                checkpoint_metrics: Mutex::new(CheckpointMetrics::default()),
                last_health_state: Mutex::new(HealthState::Healthy),
                running: AtomicBool::new(false),
            }),
            clock,
            events,
            health_timer: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts the event-consumer task and the 30s health-check timer (§4.8).
    /// Idempotent: a second call while already running is a no-op.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut rx = self.events.subscribe();
        let sink = self.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => sink.observe(&event),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        let sink = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(HEALTH_CHECK_INTERVAL).await;
                sink.run_health_check();
            }
        });
        *self.health_timer.lock() = Some(handle);
    }

    fn emit(&self, event: Event) {
        let _ = self.events.send(event);
    }

    fn observe(&self, event: &Event) {
        match event {
            Event::OperationStarted { operation_id } => {
                self.inner.operations.lock().insert(operation_id.clone(), OperationSnapshot::default());
                self.inner.totals.lock().operations_total += 1;
            }
            Event::OperationCompleted { operation_id } => {
                self.record_outcome(operation_id, "completed", true);
            }
            Event::OperationFailed { operation_id, .. } => {
                self.record_outcome(operation_id, "failed", false);
            }
            Event::OperationCancelled { operation_id } => {
                self.record_outcome(operation_id, "cancelled", false);
            }
            Event::OperationRolledBack { operation_id } => {
                self.record_outcome(operation_id, "rolled_back", false);
            }
            Event::OperationAbandoned { operation_id, .. } => {
                self.record_outcome(operation_id, "abandoned", false);
            }
            Event::SyncProgress { operation_id, progress } => {
                let mut phases = self.inner.phases.lock();
                let entry = phases.entry(operation_id.clone()).or_default();
                entry.phase = Some(progress.phase.to_string());
                entry.progress = progress.progress;
            }
            Event::SessionSequenceAnomaly { session_id, reason, event_type, sequence, previous_sequence } => {
                match reason {
                    graphsync_core::AnomalyReason::Duplicate => {
                        self.inner.duplicate_count.fetch_add(1, Ordering::Relaxed);
                    }
                    graphsync_core::AnomalyReason::OutOfOrder => {
                        self.inner.out_of_order_count.fetch_add(1, Ordering::Relaxed);
                    }
                }
                let mut ring = self.inner.sequence_anomalies.lock();
                if ring.len() >= SEQUENCE_ANOMALY_CAP {
                    ring.pop_front();
                }
                ring.push_back(SequenceAnomalyRecord {
                    session_id: session_id.clone(),
                    reason: *reason,
                    event_type: event_type.clone(),
                    sequence: *sequence,
                    previous_sequence: *previous_sequence,
                    at_epoch_ms: self.clock.epoch_ms(),
                });
            }
            Event::CheckpointMetricsUpdated { enqueued, completed, failed, retries } => {
                let mut metrics = self.inner.checkpoint_metrics.lock();
                metrics.enqueued = *enqueued;
                metrics.completed = *completed;
                metrics.failed = *failed;
                metrics.retries = *retries;
            }
            Event::LogEntry { level, message } => {
                let mut logs = self.inner.logs.lock();
                if logs.len() >= LOG_CAP {
                    logs.pop_front();
                }
                logs.push_back(LogLine { level: level.clone(), message: message.clone(), at_epoch_ms: self.clock.epoch_ms() });
            }
            Event::ConflictDetected { .. }
            | Event::ConflictsDetected { .. }
            | Event::SessionEvent { .. }
            | Event::CheckpointScheduled { .. }
            | Event::CheckpointScheduleFailed { .. }
            | Event::HealthCheck { .. }
            | Event::AlertTriggered { .. } => {}
        }
    }

    fn record_outcome(&self, operation_id: &str, outcome: &'static str, success: bool) {
        let mut operations = self.inner.operations.lock();
        if let Some(snapshot) = operations.get_mut(operation_id) {
            snapshot.outcome = Some(outcome);
        }
        drop(operations);

        let mut totals = self.inner.totals.lock();
        if success {
            totals.operations_successful += 1;
            self.inner.consecutive_failures.store(0, Ordering::SeqCst);
        } else {
            totals.operations_failed += 1;
            self.inner.consecutive_failures.fetch_add(1, Ordering::SeqCst);
        }
        drop(totals);

        self.inner.completions.lock().push_back(Completion { at_epoch_ms: self.clock.epoch_ms() });
        self.prune_completion_window();
    }

    /// Call after writing a batch/change/update so `getMetrics()` reflects
    /// throughput even while the operation is still running.
    pub fn record_counters(&self, operation_id: &str, entities: u64, relationships: u64) {
        let mut operations = self.inner.operations.lock();
        let snapshot = operations.entry(operation_id.to_string()).or_default();
        snapshot.entities_touched += entities;
        snapshot.relationships_touched += relationships;
        drop(operations);

        let mut totals = self.inner.totals.lock();
        totals.total_entities_processed += entities;
        totals.total_relationships_processed += relationships;
    }

    fn prune_completion_window(&self) {
        let now = self.clock.epoch_ms();
        let window_ms = THROUGHPUT_WINDOW.as_millis() as u64;
        let mut completions = self.inner.completions.lock();
        while completions.front().is_some_and(|c| now.saturating_sub(c.at_epoch_ms) > window_ms) {
            completions.pop_front();
        }
    }

    /// Synchronous aggregate view (§4.8 `getMetrics()`).
    pub fn metrics(&self) -> MonitoringMetrics {
        self.prune_completion_window();
        let totals = self.inner.totals.lock();
        let average_sync_time_ms = if totals.durations_ms.is_empty() {
            0.0
        } else {
            totals.durations_ms.iter().sum::<u64>() as f64 / totals.durations_ms.len() as f64
        };
        let error_rate = if totals.operations_total == 0 {
            0.0
        } else {
            totals.operations_failed as f64 / totals.operations_total as f64
        };
        let throughput_per_min =
            self.inner.completions.lock().len() as f64 / (THROUGHPUT_WINDOW.as_secs_f64() / 60.0);

        MonitoringMetrics {
            operations_total: totals.operations_total,
            operations_successful: totals.operations_successful,
            operations_failed: totals.operations_failed,
            average_sync_time_ms,
            total_entities_processed: totals.total_entities_processed,
            total_relationships_processed: totals.total_relationships_processed,
            error_rate,
            throughput_per_min,
            checkpoint: *self.inner.checkpoint_metrics.lock(),
            session_sequence: SessionSequenceStats {
                duplicates: self.inner.duplicate_count.load(Ordering::Relaxed),
                out_of_order: self.inner.out_of_order_count.load(Ordering::Relaxed),
                recent: self.inner.sequence_anomalies.lock().iter().cloned().collect(),
            },
        }
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.inner.alerts.lock().iter().cloned().collect()
    }

    pub fn logs(&self) -> Vec<LogLine> {
        self.inner.logs.lock().iter().cloned().collect()
    }

    pub fn phase_of(&self, operation_id: &str) -> Option<OperationPhase> {
        self.inner.phases.lock().get(operation_id).cloned()
    }

    /// `getHealth()` (§4.8): `unhealthy` once consecutive operation failures
    /// exceed [`UNHEALTHY_THRESHOLD`]; `degraded` on any consecutive failure
    /// or a non-zero error rate; `healthy` otherwise.
    pub fn health(&self) -> HealthState {
        let consecutive = self.inner.consecutive_failures.load(Ordering::SeqCst);
        if consecutive > UNHEALTHY_THRESHOLD as u64 {
            return HealthState::Unhealthy;
        }
        let error_rate = self.metrics().error_rate;
        if consecutive > 0 || error_rate > 0.1 {
            return HealthState::Degraded;
        }
        HealthState::Healthy
    }

    fn run_health_check(&self) {
        let state = self.health();
        *self.inner.last_health_state.lock() = state;
        self.emit(Event::HealthCheck { state });
        if state != HealthState::Healthy {
            let message = format!("health check reported {state}");
            self.raise_alert(message.clone(), state);
            self.emit(Event::AlertTriggered { message, state });
        }
    }

    fn raise_alert(&self, message: String, state: HealthState) {
        let mut alerts = self.inner.alerts.lock();
        if alerts.len() >= ALERT_CAP {
            alerts.pop_front();
        }
        alerts.push_back(Alert { message, state, at_epoch_ms: self.clock.epoch_ms() });
    }

    /// Drops snapshots, logs, and alerts older than `max_age` (§4.8 /
    /// SPEC_FULL C.2's `prune`/`reset`/`cleanup` split). Completed-operation
    /// entries are aged by their recorded completion time; running
    /// operations are never pruned regardless of age.
    pub fn prune(&self, max_age: Duration) {
        let cutoff = self.clock.epoch_ms().saturating_sub(max_age.as_millis() as u64);
        self.inner.operations.lock().retain(|_, snapshot| snapshot.outcome.is_none());
        self.inner.alerts.lock().retain(|a| a.at_epoch_ms >= cutoff);
        self.inner.logs.lock().retain(|l| l.at_epoch_ms >= cutoff);
        self.inner.sequence_anomalies.lock().retain(|r| r.at_epoch_ms >= cutoff);
    }

    /// Discards all accumulated state, for test isolation and operator-
    /// invoked resets (§4.8 / SPEC_FULL C.2).
    pub fn reset(&self) {
        self.inner.operations.lock().clear();
        self.inner.phases.lock().clear();
        self.inner.alerts.lock().clear();
        self.inner.logs.lock().clear();
        self.inner.sequence_anomalies.lock().clear();
        *self.inner.totals.lock() = MetricTotals::default();
        self.inner.completions.lock().clear();
        self.inner.duplicate_count.store(0, Ordering::SeqCst);
        self.inner.out_of_order_count.store(0, Ordering::SeqCst);
        self.inner.consecutive_failures.store(0, Ordering::SeqCst);
        *self.inner.checkpoint_metrics.lock() = CheckpointMetrics::default();
        *self.inner.last_health_state.lock() = HealthState::Healthy;
    }

    /// `cleanup(maxAge)` (§9): a thin dispatch over [`Self::prune`]/
    /// [`Self::reset`] keyed on whether the caller supplied a max age —
    /// `Some(age)` prunes, `None` resets entirely. Does not itself inspect
    /// stored data; callers that want age-distribution-aware pruning should
    /// compute a `max_age` from [`Self::metrics`]/[`Self::logs`] first.
    pub fn cleanup(&self, max_age: Option<Duration>) {
        match max_age {
            Some(age) => self.prune(age),
            None => self.reset(),
        }
    }

    pub fn record_completed_duration(&self, duration_ms: u64) {
        let mut totals = self.inner.totals.lock();
        totals.durations_ms.push_back(duration_ms);
        if totals.durations_ms.len() > 1000 {
            totals.durations_ms.pop_front();
        }
    }
}

impl<C: Clock> Drop for MonitoringSink<C> {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            if let Some(handle) = self.health_timer.lock().take() {
                handle.abort();
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionSequenceStats {
    pub duplicates: u64,
    pub out_of_order: u64,
    pub recent: Vec<SequenceAnomalyRecord>,
}

#[derive(Debug, Clone)]
pub struct MonitoringMetrics {
    pub operations_total: u64,
    pub operations_successful: u64,
    pub operations_failed: u64,
    pub average_sync_time_ms: f64,
    pub total_entities_processed: u64,
    pub total_relationships_processed: u64,
    pub error_rate: f64,
    pub throughput_per_min: f64,
    pub checkpoint: CheckpointMetrics,
    pub session_sequence: SessionSequenceStats,
}

#[cfg(test)]
#[path = "monitoring_tests.rs"]
mod tests;
