// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error type adapter calls fail with, mapped 1:1 onto [`graphsync_core::SyncErrorKind`]
//! by callers in `graphsync-engine`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("parse failed for {file}: {message}")]
    Parse { file: String, message: String },
    #[error("store operation failed: {message}")]
    Database { message: String },
    #[error("optional capability unavailable: {capability}")]
    Capability { capability: String },
    #[error("adapter unavailable: {message}")]
    Unavailable { message: String },
}
