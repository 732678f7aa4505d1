// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proptest strategies shared with other crates' test suites (the
//! `test-support` feature), so arbitrary-generation of domain primitives
//! lives in one place instead of every crate inventing its own.

use proptest::prelude::*;

/// A realistic session id: short lowercase-alphanumeric, optionally
/// dash-segmented.
pub fn session_id() -> impl Strategy<Value = String> {
    "[a-z0-9]{3,12}(-[a-z0-9]{3,8})?"
}

/// A strictly increasing run of sequence numbers, the shape the Sequence
/// Tracker (C3) expects from a well-behaved producer.
pub fn increasing_sequence(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<u64>> {
    proptest::collection::vec(1u64..1000, len).prop_map(|deltas| {
        let mut seq = 0u64;
        deltas
            .into_iter()
            .map(|d| {
                seq += d;
                seq
            })
            .collect()
    })
}
