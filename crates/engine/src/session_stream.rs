// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session Stream (C7, §4.7): emits the structured `session_started` /
//! `session_keepalive` / `session_relationships` / `session_checkpoint` /
//! `session_teardown` events for an incremental operation, buffers session
//! relationship writes between flushes, and runs the keepalive timer.
//!
//! Per the redesign note in spec §9, the session-wide sequence allocator
//! lives here rather than duplicated per flow: edge construction always
//! goes through [`SessionStream::next_edge`], which allocates the next
//! sequence number, consults the shared [`SequenceTracker`] for anomalies,
//! and derives the edge's `eventId`.

use crate::sequence_tracker::SequenceTracker;
use graphsync_adapters::GraphStore;
use graphsync_core::{
    derive_event_id, Clock, Event, Relationship, SessionStreamConfig, SessionStreamEvent,
    SessionStreamEventType, SyncError,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

fn iso8601(epoch_ms: u64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(epoch_ms as i64)
        .unwrap_or_default()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// One per incremental operation. Torn down exactly once via [`SessionStream::teardown`],
/// which callers are expected to invoke from every exit path (success, error,
/// cancellation) — the `finally`-block guarantee spec §4.7 describes.
pub struct SessionStream<C: Clock> {
    session_id: String,
    operation_id: String,
    clock: C,
    config: SessionStreamConfig,
    sequence_tracker: Arc<SequenceTracker>,
    local_sequence: AtomicU64,
    buffer: Mutex<Vec<Relationship>>,
    torn_down: AtomicBool,
    events: broadcast::Sender<Event>,
    keepalive: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Clock + 'static> SessionStream<C> {
    pub fn new(
        operation_id: impl Into<String>,
        clock: C,
        config: SessionStreamConfig,
        sequence_tracker: Arc<SequenceTracker>,
        events: broadcast::Sender<Event>,
    ) -> Self {
        let operation_id = operation_id.into();
        let session_id = format!("session_{operation_id}");
        Self {
            session_id,
            operation_id,
            clock,
            config,
            sequence_tracker,
            local_sequence: AtomicU64::new(0),
            buffer: Mutex::new(Vec::new()),
            torn_down: AtomicBool::new(false),
            events,
            keepalive: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn publish(&self, kind: SessionStreamEventType, payload: serde_json::Value) {
        let event = SessionStreamEvent {
            kind,
            session_id: self.session_id.clone(),
            operation_id: self.operation_id.clone(),
            timestamp: iso8601(self.clock.epoch_ms()),
            payload,
        };
        let _ = self.events.send(Event::SessionEvent { event });
    }

    /// Emits `session_started` and arms the keepalive timer (§4.7).
    pub fn start(self: &Arc<Self>, total_changes: usize, batch_size: u32, max_concurrency: u32, timeout: std::time::Duration) {
        self.publish(
            SessionStreamEventType::SessionStarted,
            serde_json::json!({
                "totalChanges": total_changes,
                "batchSize": batch_size,
                "maxConcurrency": max_concurrency,
            }),
        );
        let interval = self.config.keepalive_interval(timeout);
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(stream) = weak.upgrade() else { return };
                if stream.torn_down.load(Ordering::SeqCst) {
                    return;
                }
                stream.publish(SessionStreamEventType::SessionKeepalive, serde_json::json!({}));
            }
        });
        *self.keepalive.lock() = Some(handle);
    }

    /// Allocates the next session-wide sequence number for `event_type` and
    /// checks it against the shared [`SequenceTracker`]. Returns `None` when
    /// the anomaly policy says to skip the edge (duplicate/out-of-order
    /// under `ANOMALY_RESOLUTION_MODE=skip`) — the caller must not buffer it.
    pub fn next_edge_sequence(&self, event_type: &str) -> Option<u64> {
        let seq = self.local_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let (result, anomaly_event) = self.sequence_tracker.record(&self.session_id, event_type, seq);
        if let Some(event) = anomaly_event {
            let _ = self.events.send(event);
        }
        if result.should_skip {
            None
        } else {
            Some(seq)
        }
    }

    /// Derives `eventId = "evt_" + first16(sha1(sessionId|seq|type|toEntityId|timestamp))` (§4.7).
    pub fn derive_event_id(&self, seq: u64, event_type: &str, to_entity_id: &str, timestamp: u64) -> String {
        derive_event_id(&[&self.session_id, &seq.to_string(), event_type, to_entity_id, &timestamp.to_string()])
    }

    /// Buffers a session relationship write for the next flush. Skipped
    /// edges (per [`SessionStream::next_edge_sequence`]) must never reach here.
    pub fn buffer_relationship(&self, relationship: Relationship) {
        self.buffer.lock().push(relationship);
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Bulk-flushes the buffered relationships through the graph store and
    /// emits `session_relationships` with the serialized edges (§4.7),
    /// called at change boundaries and once more at end of flow.
    pub async fn flush(&self, graph_store: &dyn GraphStore) -> Result<usize, graphsync_adapters::AdapterError> {
        let pending: Vec<Relationship> = std::mem::take(&mut *self.buffer.lock());
        if pending.is_empty() {
            return Ok(0);
        }
        let count = pending.len();
        let outcome = graph_store
            .create_relationships_bulk(pending.clone(), graphsync_adapters::BulkWriteOptions { validate: false, ..Default::default() })
            .await?;
        self.publish(
            SessionStreamEventType::SessionRelationships,
            serde_json::json!({ "edges": pending, "succeeded": outcome.succeeded.len(), "failed": outcome.failed.len() }),
        );
        Ok(count)
    }

    /// Publishes `session_checkpoint` with `status="manual_intervention"`
    /// after a checkpoint enqueue failure (§4.5 "annotate-on-enqueue-failure").
    pub fn publish_manual_intervention(&self, seeds: &[String], error: &str) {
        self.publish(
            SessionStreamEventType::SessionCheckpoint,
            serde_json::json!({ "status": "manual_intervention", "seeds": seeds, "error": error }),
        );
    }

    /// Publishes `session_checkpoint` after a successful enqueue.
    pub fn publish_checkpoint_scheduled(&self, job_id: &str, seeds: &[String]) {
        self.publish(
            SessionStreamEventType::SessionCheckpoint,
            serde_json::json!({ "status": "scheduled", "jobId": job_id, "seeds": seeds }),
        );
    }

    /// Emits `session_teardown` exactly once, with final status, counters,
    /// and the last `teardown_error_cap` errors, then stops the keepalive
    /// timer. Safe to call more than once — every call after the first is a
    /// no-op, matching the "exactly once" invariant (§8) regardless of which
    /// exit path (success, error, cancellation) triggers it.
    pub fn teardown(&self, status: &str, counters: serde_json::Value, errors: &[SyncError]) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.keepalive.lock().take() {
            handle.abort();
        }
        let tail: Vec<&SyncError> = errors.iter().rev().take(self.config.teardown_error_cap).collect();
        self.publish(
            SessionStreamEventType::SessionTeardown,
            serde_json::json!({ "status": status, "counters": counters, "errors": tail }),
        );
        self.sequence_tracker.forget_session(&self.session_id);
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "session_stream_tests.rs"]
mod tests;
