// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn event_name_is_stable_snake_case() {
    let event = Event::OperationStarted { operation_id: "full_1_0".into() };
    assert_eq!(event.name(), "operation_started");
}

#[test]
fn log_summary_includes_operation_id() {
    let event = Event::OperationCompleted { operation_id: "full_1_0".into() };
    assert!(event.log_summary().contains("full_1_0"));
}

#[test]
fn operation_failed_summary_counts_errors() {
    let event = Event::OperationFailed {
        operation_id: "full_1_0".into(),
        errors: vec![SyncError::new(crate::errors::SyncErrorKind::Database, "x", 1)],
    };
    assert!(event.log_summary().contains("errors=1"));
}

#[test]
fn serializes_with_event_tag() {
    let event = Event::HealthCheck { state: HealthState::Degraded };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], "health_check");
    assert_eq!(json["state"], "degraded");
}

#[test]
fn session_stream_event_type_display() {
    assert_eq!(SessionStreamEventType::SessionTeardown.to_string(), "session_teardown");
}
