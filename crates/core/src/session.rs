// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identity and per-session sequence tracking.
//!
//! `SessionId` identifies the logical grouping of all temporal edges/events
//! produced by one incremental sync operation. `SessionSequenceState` is the
//! per-session monotonic sequence allocator and anomaly detector (C3).

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;

/// Unique identifier for a sync session.
///
/// Sessions group the temporal edges and stream events produced by one
/// incremental sync operation, formatted as `session_<operationId>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Create a new SessionId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the canonical session id for an operation.
    pub fn for_operation(operation_id: &str) -> Self {
        Self(format!("session_{operation_id}"))
    }

    /// Get the string value of this SessionId.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for SessionId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SessionId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The kind of session stream event carrying a sequence number, used to
/// track per-type monotonicity independently of the session-wide sequence.
pub type SequenceEventType = String;

/// Why a sequenced event was (or would be) flagged as an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyReason {
    /// `seq == lastSeq`, session-wide or per-type.
    Duplicate,
    /// `seq < lastSeq`.
    OutOfOrder,
}

crate::simple_display! {
    AnomalyReason {
        Duplicate => "duplicate",
        OutOfOrder => "out_of_order",
    }
}

/// Outcome of recording one sequenced event against a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecordResult {
    pub should_skip: bool,
    pub reason: Option<AnomalyReason>,
    /// The session-wide sequence number observed immediately before this call.
    pub previous_sequence: u64,
    /// The per-type sequence number observed immediately before this call.
    pub previous_type_sequence: Option<u64>,
}

/// Per-session sequencing state: the session-wide high-water mark plus a
/// per-event-type high-water mark for finer anomaly classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSequenceState {
    pub last_sequence: u64,
    pub last_type: Option<SequenceEventType>,
    pub per_type: HashMap<SequenceEventType, u64>,
}

impl SessionSequenceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify and (if not an anomaly being skipped) record `seq` for
    /// `event_type`. The session-wide high-water mark only advances when
    /// `seq` strictly exceeds it; the per-type mark is always updated when
    /// recording succeeds.
    ///
    /// `skip_anomalies` selects whether duplicate/out-of-order events should
    /// be rejected (`ANOMALY_RESOLUTION_MODE=skip`) or merely flagged.
    pub fn record(
        &mut self,
        event_type: &str,
        seq: u64,
        skip_anomalies: bool,
    ) -> SequenceRecordResult {
        let previous_sequence = self.last_sequence;
        let previous_type_sequence = self.per_type.get(event_type).copied();

        let reason = if seq == previous_sequence
            || previous_type_sequence.is_some_and(|p| seq == p)
        {
            Some(AnomalyReason::Duplicate)
        } else if seq < previous_sequence
            || previous_type_sequence.is_some_and(|p| seq < p)
        {
            Some(AnomalyReason::OutOfOrder)
        } else {
            None
        };

        let should_skip = reason.is_some() && skip_anomalies;

        if !should_skip {
            if seq > self.last_sequence {
                self.last_sequence = seq;
                self.last_type = Some(event_type.to_string());
            }
            self.per_type.insert(event_type.to_string(), seq);
        }

        SequenceRecordResult { should_skip, reason, previous_sequence, previous_type_sequence }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
