// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Best-effort Git metadata lookup (§6), consulted for `MODIFIED_BY` edges
//! and critical-change snippets (§4.1.2). Failures here are swallowed by
//! the caller; this trait itself just reports what happened.

use crate::error::AdapterError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub author: String,
    pub email: String,
    pub hash: String,
    pub date: String,
}

#[async_trait]
pub trait GitProvider: Send + Sync {
    async fn get_last_commit_info(&self, path: &str) -> Result<CommitInfo, AdapterError>;
    async fn get_unified_diff(&self, path: &str, context_lines: u32) -> Result<String, AdapterError>;
}
