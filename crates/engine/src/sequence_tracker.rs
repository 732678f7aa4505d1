// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sequence Tracker (C3, §4.4): wraps [`SessionSequenceState`] per session,
//! consulting [`AnomalyPolicy`] to decide whether duplicates/out-of-order
//! events are skipped or merely flagged, and turns anomalies into
//! [`Event::SessionSequenceAnomaly`].

use graphsync_core::{AnomalyPolicy, Event, SequenceRecordResult, SessionSequenceState};
use parking_lot::Mutex;
use std::collections::HashMap;

pub struct SequenceTracker {
    policy: AnomalyPolicy,
    sessions: Mutex<HashMap<String, SessionSequenceState>>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self { policy: AnomalyPolicy::from_env(), sessions: Mutex::new(HashMap::new()) }
    }

    pub fn with_policy(policy: AnomalyPolicy) -> Self {
        Self { policy, sessions: Mutex::new(HashMap::new()) }
    }

    /// Records `seq` for `event_type` against `session_id`. Returns the raw
    /// record result and, when the event was flagged as an anomaly, the
    /// corresponding event to emit on the session stream.
    pub fn record(
        &self,
        session_id: &str,
        event_type: &str,
        seq: u64,
    ) -> (SequenceRecordResult, Option<Event>) {
        let mut sessions = self.sessions.lock();
        let state = sessions.entry(session_id.to_string()).or_default();
        let result = state.record(event_type, seq, self.policy.should_skip_anomalies());

        let event = result.reason.map(|reason| Event::SessionSequenceAnomaly {
            session_id: session_id.to_string(),
            reason,
            event_type: event_type.to_string(),
            sequence: seq,
            previous_sequence: result.previous_sequence,
        });

        (result, event)
    }

    pub fn forget_session(&self, session_id: &str) {
        self.sessions.lock().remove(session_id);
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

impl Default for SequenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "sequence_tracker_tests.rs"]
mod tests;
