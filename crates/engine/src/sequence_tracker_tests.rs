// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use graphsync_core::AnomalyReason;
use proptest::prelude::*;

#[test]
fn first_sequence_per_session_is_never_anomalous() {
    let tracker = SequenceTracker::with_policy(AnomalyPolicy::Warn);
    let (result, event) = tracker.record("s1", "session_relationships", 1);
    assert!(!result.should_skip);
    assert!(result.reason.is_none());
    assert!(event.is_none());
}

#[test]
fn duplicate_sequence_is_flagged_under_warn_but_not_skipped() {
    let tracker = SequenceTracker::with_policy(AnomalyPolicy::Warn);
    tracker.record("s1", "session_relationships", 5);
    let (result, event) = tracker.record("s1", "session_relationships", 5);
    assert!(!result.should_skip);
    assert_eq!(result.reason, Some(AnomalyReason::Duplicate));
    match event.unwrap() {
        Event::SessionSequenceAnomaly { session_id, reason, sequence, previous_sequence, .. } => {
            assert_eq!(session_id, "s1");
            assert_eq!(reason, AnomalyReason::Duplicate);
            assert_eq!(sequence, 5);
            assert_eq!(previous_sequence, 5);
        }
        other => panic!("expected SessionSequenceAnomaly, got {other:?}"),
    }
}

#[test]
fn duplicate_sequence_is_skipped_under_skip_policy() {
    let tracker = SequenceTracker::with_policy(AnomalyPolicy::Skip);
    tracker.record("s1", "session_relationships", 5);
    let (result, _event) = tracker.record("s1", "session_relationships", 5);
    assert!(result.should_skip);
}

#[test]
fn out_of_order_sequence_is_flagged() {
    let tracker = SequenceTracker::with_policy(AnomalyPolicy::Warn);
    tracker.record("s1", "session_relationships", 10);
    let (result, event) = tracker.record("s1", "session_relationships", 3);
    assert_eq!(result.reason, Some(AnomalyReason::OutOfOrder));
    assert!(event.is_some());
}

#[test]
fn sessions_are_tracked_independently() {
    let tracker = SequenceTracker::with_policy(AnomalyPolicy::Warn);
    tracker.record("s1", "session_relationships", 5);
    let (result, _) = tracker.record("s2", "session_relationships", 1);
    assert!(result.reason.is_none());
    assert_eq!(tracker.active_session_count(), 2);
    tracker.forget_session("s1");
    assert_eq!(tracker.active_session_count(), 1);
}

proptest! {
    /// A strictly increasing run of sequence numbers for one session/event
    /// type is, by construction, never a duplicate or out-of-order anomaly.
    #[test]
    fn increasing_sequence_is_never_anomalous(
        session in graphsync_core::proptest_support::session_id(),
        seqs in graphsync_core::proptest_support::increasing_sequence(1..50),
    ) {
        let tracker = SequenceTracker::with_policy(AnomalyPolicy::Warn);
        for seq in seqs {
            let (result, event) = tracker.record(&session, "session_relationships", seq);
            prop_assert!(result.reason.is_none());
            prop_assert!(event.is_none());
        }
    }

    /// Repeating the same sequence number a second time is always flagged
    /// as a duplicate, regardless of the session id or the number's value.
    #[test]
    fn repeating_a_sequence_number_is_always_a_duplicate(
        session in graphsync_core::proptest_support::session_id(),
        seq in 1u64..10_000,
    ) {
        let tracker = SequenceTracker::with_policy(AnomalyPolicy::Warn);
        tracker.record(&session, "session_relationships", seq);
        let (result, _event) = tracker.record(&session, "session_relationships", seq);
        prop_assert_eq!(result.reason, Some(AnomalyReason::Duplicate));
    }
}
