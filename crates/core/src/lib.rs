// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! graphsync-core: shared domain types for the synchronization core —
//! operation/conflict/checkpoint records, session sequencing, the clock
//! abstraction, and the events the engine emits.

pub mod macros;

pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod conflict;
pub mod errors;
pub mod event;
pub mod id;
pub mod operation;
pub mod relationship;
pub mod session;

#[cfg(feature = "test-support")]
pub mod proptest_support;

pub use checkpoint::{
    CheckpointJob, CheckpointJobBuilder, CheckpointJobId, CheckpointJobState, CheckpointReason,
    HOP_COUNT_MAX, HOP_COUNT_MIN,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{AnomalyPolicy, EngineConfig, RetryPolicy, SessionStreamConfig};
pub use conflict::{
    Conflict, ConflictId, ConflictResolution, ConflictType, ConflictingValues, ResolutionStrategy,
};
pub use errors::{has_non_recoverable, SyncError, SyncErrorKind};
pub use event::{
    Event, HealthState, SessionStreamEvent, SessionStreamEventType, SyncPhase, SyncProgress,
};
pub use id::{derive_event_id, short, IdBuf, TimestampCounterIdGen};
pub use operation::{
    ChangeType, ConflictResolutionMode, FileChange, OperationCounters, OperationOptions,
    OperationMap, OperationPayload, PartialUpdate, PartialUpdateType, RollbackPointId,
    SyncOperation, SyncOperationStatus, SyncOperationType, SyncStatistics, Tuning,
    BATCH_SIZE_MAX, BATCH_SIZE_MIN, DEFAULT_TIMEOUT_MS, MAX_CONCURRENCY_MAX, MAX_CONCURRENCY_MIN,
};
pub use relationship::{
    ChangeInfo, ChangeKind, CriticalChange, EndpointRef, ImpactSeverity, Relationship,
    ResolutionMetadata, ResolvedTarget, StateTransition,
};
pub use session::{AnomalyReason, SequenceRecordResult, SessionId, SessionSequenceState};
