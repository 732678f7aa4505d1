// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! External-interface traits consumed by the synchronization core: the
//! parser, graph store, checkpoint persistence, git provider, and module
//! indexer. Implementations live outside this workspace; `test-support`
//! gates a set of in-memory fakes other crates' test suites run against.

pub mod checkpoint_persistence;
pub mod error;
pub mod git_provider;
pub mod graph_store;
pub mod module_indexer;
pub mod parser;

#[cfg(feature = "test-support")]
pub mod test_support;

pub use checkpoint_persistence::{CheckpointPersistence, PersistedJob};
pub use error::AdapterError;
pub use git_provider::{CommitInfo, GitProvider};
pub use graph_store::{
    BulkOutcome, BulkWriteOptions, CheckpointAnnotation, EntityPatch, GraphStore, ScanScope,
    WriteOptions,
};
pub use module_indexer::ModuleIndexer;
pub use parser::{Entity, IncrementalParseResult, ParseResult, Parser};

#[cfg(feature = "test-support")]
pub use test_support::{
    FakeGitProvider, FakeModuleIndexer, FakeParser, InMemoryGraphStore, MemoryCheckpointPersistence,
};
