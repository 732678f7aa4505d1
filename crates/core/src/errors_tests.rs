// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn rollback_and_checkpoint_and_unknown_default_non_recoverable() {
    assert!(!SyncErrorKind::Rollback.default_recoverable());
    assert!(!SyncErrorKind::Checkpoint.default_recoverable());
    assert!(!SyncErrorKind::Unknown.default_recoverable());
}

#[test]
fn parse_database_conflict_capability_cancelled_default_recoverable() {
    for kind in [
        SyncErrorKind::Parse,
        SyncErrorKind::Database,
        SyncErrorKind::Conflict,
        SyncErrorKind::Capability,
        SyncErrorKind::Cancelled,
    ] {
        assert!(kind.default_recoverable());
    }
}

#[test]
fn cancelled_error_is_always_recoverable() {
    let err = SyncError::cancelled(1000);
    assert!(err.recoverable);
    assert_eq!(err.kind, SyncErrorKind::Cancelled);
}

#[test]
fn has_non_recoverable_detects_single_bad_entry() {
    let errors = vec![
        SyncError::new(SyncErrorKind::Database, "transient", 1).with_recoverable(true),
        SyncError::new(SyncErrorKind::Rollback, "fatal", 2),
    ];
    assert!(has_non_recoverable(&errors));
}

#[test]
fn has_non_recoverable_false_when_all_recoverable() {
    let errors = vec![SyncError::new(SyncErrorKind::Database, "transient", 1)];
    assert!(!has_non_recoverable(&errors));
}

#[test]
fn with_file_attaches_path() {
    let err = SyncError::new(SyncErrorKind::Parse, "bad token", 5).with_file("src/lib.rs");
    assert_eq!(err.file.as_deref(), Some("src/lib.rs"));
}
