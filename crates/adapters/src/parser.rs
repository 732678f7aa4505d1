// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The source-file parser (consumed, §6). Entity/relationship shapes are
//! owned by the parser and graph store, not this workspace — we only carry
//! the envelope fields the engine reasons about.

use crate::error::AdapterError;
use async_trait::async_trait;
use graphsync_core::Relationship;
use serde::{Deserialize, Serialize};

/// An opaque entity record. `kind`/`file` are lifted out for the fields the
/// engine needs (symbol indexing, `__sourceFile` tagging); everything else
/// the parser reports rides along in `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub file: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncrementalParseResult {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    pub is_incremental: bool,
    #[serde(default)]
    pub updated_entities: Vec<String>,
    #[serde(default)]
    pub added_entities: Vec<String>,
    #[serde(default)]
    pub removed_entities: Vec<String>,
    #[serde(default)]
    pub added_relationships: Vec<Relationship>,
    #[serde(default)]
    pub removed_relationships: Vec<Relationship>,
}

#[async_trait]
pub trait Parser: Send + Sync {
    async fn parse_file(&self, path: &str) -> Result<ParseResult, AdapterError>;

    async fn parse_file_incremental(
        &self,
        path: &str,
    ) -> Result<IncrementalParseResult, AdapterError>;

    /// The full file list for a root-package full sync (§4.1.1 step 2).
    async fn list_files(&self) -> Result<Vec<String>, AdapterError>;
}
