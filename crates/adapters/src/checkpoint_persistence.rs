// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional durable store for checkpoint jobs (§6). Absence means the
//! Checkpoint Job Runner (C4) operates in-memory only.

use crate::error::AdapterError;
use async_trait::async_trait;
use graphsync_core::CheckpointJobState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedJob {
    pub job_id: String,
    pub state: CheckpointJobState,
    pub attempts: u32,
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[async_trait]
pub trait CheckpointPersistence: Send + Sync {
    async fn put(&self, job: PersistedJob) -> Result<(), AdapterError>;
    async fn get(&self, job_id: &str) -> Result<Option<PersistedJob>, AdapterError>;
    async fn delete(&self, job_id: &str) -> Result<(), AdapterError>;
    /// Jobs still `queued` at startup, for crash recovery.
    async fn list_queued(&self) -> Result<Vec<PersistedJob>, AdapterError>;
}
