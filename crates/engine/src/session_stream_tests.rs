// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use graphsync_adapters::InMemoryGraphStore;
use graphsync_core::{AnomalyPolicy, FakeClock, SyncErrorKind};
use std::time::Duration;

fn relationship(id: &str, to: &str) -> Relationship {
    Relationship {
        id: id.into(),
        kind: "modified_in".into(),
        from_entity_id: "e1".into(),
        to_entity_id: to.into(),
        created: 1,
        last_modified: 1,
        version: 1,
        metadata: None,
        session_id: None,
        sequence_number: None,
        timestamp: None,
        event_id: None,
        actor: None,
        annotations: None,
        change_info: None,
        state_transition: None,
        impact: None,
        to_ref: None,
        from_ref: None,
        ambiguous: false,
        source_file: None,
    }
}

fn new_stream() -> (Arc<SessionStream<FakeClock>>, broadcast::Receiver<Event>) {
    let (tx, rx) = broadcast::channel(64);
    let tracker = Arc::new(SequenceTracker::new());
    let stream = Arc::new(SessionStream::new("op1", FakeClock::new(), SessionStreamConfig::default(), tracker, tx));
    (stream, rx)
}

#[test]
fn session_id_is_derived_from_the_operation_id() {
    let (stream, _rx) = new_stream();
    assert_eq!(stream.session_id(), "session_op1");
}

#[tokio::test]
async fn start_emits_session_started() {
    let (stream, mut rx) = new_stream();
    stream.start(5, 60, 12, Duration::from_secs(30));
    let event = rx.recv().await.unwrap();
    match event {
        Event::SessionEvent { event } => {
            assert_eq!(event.kind, SessionStreamEventType::SessionStarted);
            assert_eq!(event.session_id, "session_op1");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn next_edge_sequence_increments_monotonically() {
    let (stream, _rx) = new_stream();
    let first = stream.next_edge_sequence("modified_in").unwrap();
    let second = stream.next_edge_sequence("modified_in").unwrap();
    assert_eq!(first, 1);
    assert_eq!(second, 2);
}

#[test]
fn next_edge_sequence_skips_duplicates_under_skip_policy() {
    // Two streams over the same operation (hence the same session id)
    // sharing one tracker: each allocates its own local 1, 2, 3, ... but the
    // tracker keys anomalies by session id, so the second stream's first
    // call collides with the first stream's and must be skipped.
    let (tx_a, _rx_a) = broadcast::channel(64);
    let (tx_b, _rx_b) = broadcast::channel(64);
    let tracker = Arc::new(SequenceTracker::with_policy(AnomalyPolicy::Skip));
    let a: Arc<SessionStream<FakeClock>> =
        Arc::new(SessionStream::new("op1", FakeClock::new(), SessionStreamConfig::default(), tracker.clone(), tx_a));
    let b: Arc<SessionStream<FakeClock>> =
        Arc::new(SessionStream::new("op1", FakeClock::new(), SessionStreamConfig::default(), tracker, tx_b));

    assert_eq!(a.next_edge_sequence("modified_in"), Some(1));
    assert_eq!(b.next_edge_sequence("modified_in"), None);
}

#[test]
fn derive_event_id_is_deterministic_and_varies_with_its_inputs() {
    let (stream, _rx) = new_stream();
    let a = stream.derive_event_id(1, "modified_in", "e2", 1_000);
    let b = stream.derive_event_id(1, "modified_in", "e2", 1_000);
    let c = stream.derive_event_id(1, "modified_in", "e3", 1_000);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(a.starts_with("evt_"));
}

#[tokio::test]
async fn buffer_and_flush_writes_through_and_clears() {
    let (stream, mut rx) = new_stream();
    let store = InMemoryGraphStore::new();
    stream.buffer_relationship(relationship("rel1", "e2"));
    stream.buffer_relationship(relationship("rel2", "e3"));
    assert_eq!(stream.buffered_len(), 2);

    let flushed = stream.flush(&store).await.unwrap();
    assert_eq!(flushed, 2);
    assert_eq!(stream.buffered_len(), 0);
    assert_eq!(store.relationship_count(), 2);

    let event = rx.recv().await.unwrap();
    match event {
        Event::SessionEvent { event } => assert_eq!(event.kind, SessionStreamEventType::SessionRelationships),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn flush_with_an_empty_buffer_is_a_no_op() {
    let (stream, _rx) = new_stream();
    let store = InMemoryGraphStore::new();
    let flushed = stream.flush(&store).await.unwrap();
    assert_eq!(flushed, 0);
}

#[tokio::test]
async fn publish_checkpoint_scheduled_reports_status_scheduled() {
    let (stream, mut rx) = new_stream();
    stream.publish_checkpoint_scheduled("job-1", &["e1".to_string()]);
    let event = rx.recv().await.unwrap();
    match event {
        Event::SessionEvent { event } => {
            assert_eq!(event.kind, SessionStreamEventType::SessionCheckpoint);
            assert_eq!(event.payload["status"], "scheduled");
            assert_eq!(event.payload["jobId"], "job-1");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn publish_manual_intervention_reports_status_manual_intervention() {
    let (stream, mut rx) = new_stream();
    stream.publish_manual_intervention(&["e1".to_string()], "enqueue failed");
    let event = rx.recv().await.unwrap();
    match event {
        Event::SessionEvent { event } => {
            assert_eq!(event.payload["status"], "manual_intervention");
            assert_eq!(event.payload["error"], "enqueue failed");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn teardown_fires_exactly_once() {
    let (stream, mut rx) = new_stream();
    stream.teardown("completed", serde_json::json!({"entities": 3}), &[]);
    assert!(stream.is_torn_down());
    stream.teardown("completed", serde_json::json!({"entities": 3}), &[]);

    let mut teardown_events = 0;
    while let Ok(event) = rx.try_recv() {
        if let Event::SessionEvent { event } = event {
            if event.kind == SessionStreamEventType::SessionTeardown {
                teardown_events += 1;
            }
        }
    }
    assert_eq!(teardown_events, 1);
}

#[tokio::test]
async fn teardown_caps_errors_to_the_configured_tail() {
    let (tx, mut rx) = broadcast::channel(64);
    let tracker = Arc::new(SequenceTracker::new());
    let mut config = SessionStreamConfig::default();
    config.teardown_error_cap = 2;
    let stream: Arc<SessionStream<FakeClock>> = Arc::new(SessionStream::new("op1", FakeClock::new(), config, tracker, tx));

    let now = 1_000;
    let errors: Vec<SyncError> = (0..5).map(|i| SyncError::new(SyncErrorKind::Database, format!("err{i}"), now)).collect();
    stream.teardown("failed", serde_json::json!({}), &errors);

    let event = rx.recv().await.unwrap();
    match event {
        Event::SessionEvent { event } => {
            let tail = event.payload["errors"].as_array().unwrap();
            assert_eq!(tail.len(), 2);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn teardown_stops_the_keepalive_timer() {
    let (stream, mut rx) = new_stream();
    stream.start(1, 60, 12, Duration::from_millis(18));
    // session_started
    rx.recv().await.unwrap();
    stream.teardown("completed", serde_json::json!({}), &[]);
    // session_teardown
    let event = rx.recv().await.unwrap();
    assert!(matches!(event, Event::SessionEvent { event } if event.kind == SessionStreamEventType::SessionTeardown));

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(rx.try_recv().is_err());
}
