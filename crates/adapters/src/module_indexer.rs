// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Best-effort symbol-indexer for module/package discovery (§6), invoked
//! once at the start of a full sync (§4.1.1 step 1). Failures never fail
//! the operation — only `warn!`-logged by the caller.

use crate::error::AdapterError;
use async_trait::async_trait;

#[async_trait]
pub trait ModuleIndexer: Send + Sync {
    /// Index the root package; returns the number of modules discovered.
    async fn index_root_package(&self) -> Result<u64, AdapterError>;
}
