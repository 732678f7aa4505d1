// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn build_dedups_seed_entity_ids() {
    let job = CheckpointJobBuilder::new(
        "session_1",
        vec!["a".into(), "b".into(), "a".into()],
        "coordinator",
    )
    .build(1)
    .unwrap();
    assert_eq!(job.seed_entity_ids, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn build_rejects_empty_seed_set() {
    let job = CheckpointJobBuilder::new("session_1", vec![], "coordinator").build(1);
    assert!(job.is_none());
}

#[test]
fn build_clamps_hop_count() {
    let job = CheckpointJobBuilder::new("session_1", vec!["a".into()], "coordinator")
        .hop_count(99)
        .build(1)
        .unwrap();
    assert_eq!(job.hop_count, HOP_COUNT_MAX);

    let job = CheckpointJobBuilder::new("session_1", vec!["a".into()], "coordinator")
        .hop_count(0)
        .build(1)
        .unwrap();
    assert_eq!(job.hop_count, HOP_COUNT_MIN);
}

#[test]
fn build_sets_queued_state_and_zero_attempts() {
    let job = CheckpointJobBuilder::new("session_1", vec!["a".into()], "coordinator")
        .build(1)
        .unwrap();
    assert_eq!(job.state, CheckpointJobState::Queued);
    assert_eq!(job.attempts, 0);
}

#[test]
fn clamp_hop_count_boundaries() {
    assert_eq!(clamp_hop_count(0), 1);
    assert_eq!(clamp_hop_count(5), 5);
    assert_eq!(clamp_hop_count(6), 5);
}
