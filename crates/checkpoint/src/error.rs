// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("seedEntityIds must be non-empty after deduplication")]
    EmptySeeds,
}
