// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sync error records.
//!
//! [`SyncError`] is a record attached to a [`crate::operation::SyncOperation`],
//! not a Rust `Error` raised and caught — the engine accumulates these as it
//! works through a batch/change/update list rather than aborting on the first
//! one. `recoverable=false` is the one field that actually changes control
//! flow: it forces the owning operation to finalize as failed.

use serde::{Deserialize, Serialize};

/// Origin/category of a [`SyncError`], per spec §3 and §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    /// Parser failure on a file. Recoverable except when the path itself is
    /// invalid during an incremental change.
    Parse,
    /// Store write/query failure. Recoverable for a single entity/relationship
    /// within a bulk batch.
    Database,
    /// Conflict-detector failure (not a detected conflict — a failure while
    /// detecting one).
    Conflict,
    /// Cancellation was observed at a cooperative checkpoint.
    Cancelled,
    /// Rollback point creation or execution failed.
    Rollback,
    /// An optional store capability (e.g. bulk embeddings) is unavailable.
    Capability,
    /// Checkpoint enqueue failed.
    Checkpoint,
    /// Uncategorized failure.
    Unknown,
}

crate::simple_display! {
    SyncErrorKind {
        Parse => "parse",
        Database => "database",
        Conflict => "conflict",
        Cancelled => "cancelled",
        Rollback => "rollback",
        Capability => "capability",
        Checkpoint => "checkpoint",
        Unknown => "unknown",
    }
}

impl SyncErrorKind {
    /// Whether this kind of error is recoverable *by default* — callers may
    /// still override per spec's per-kind exceptions (e.g. `parse` during an
    /// incremental change with an invalid path).
    pub fn default_recoverable(self) -> bool {
        !matches!(
            self,
            SyncErrorKind::Rollback | SyncErrorKind::Checkpoint | SyncErrorKind::Unknown
        )
    }
}

/// One recorded failure against a sync operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncError {
    /// File the error pertains to, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub kind: SyncErrorKind,
    pub message: String,
    pub timestamp: u64,
    pub recoverable: bool,
}

impl SyncError {
    pub fn new(kind: SyncErrorKind, message: impl Into<String>, timestamp: u64) -> Self {
        Self {
            file: None,
            recoverable: kind.default_recoverable(),
            kind,
            message: message.into(),
            timestamp,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    pub fn cancelled(timestamp: u64) -> Self {
        Self::new(SyncErrorKind::Cancelled, "operation cancelled", timestamp)
            .with_recoverable(true)
    }
}

/// Whether a list of errors contains at least one non-recoverable entry —
/// the trigger for finalizing an operation as failed (§7).
pub fn has_non_recoverable(errors: &[SyncError]) -> bool {
    errors.iter().any(|e| !e.recoverable)
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
