// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reference Resolver (C1, §4.2): resolves a relationship's `toEntityId`
//! from a structured ref or a string token, consulting the in-process
//! [`LocalSymbolIndex`] before falling back to the graph store.

use graphsync_adapters::{AdapterError, GraphStore};
use graphsync_core::{EndpointRef, ResolutionMetadata, ResolvedTarget};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// `(filePath, symbolName) → entityId`, populated during batch parse (§3).
#[derive(Default)]
pub struct LocalSymbolIndex {
    index: RwLock<HashMap<(String, String), String>>,
}

impl LocalSymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, file: impl Into<String>, name: impl Into<String>, entity_id: impl Into<String>) {
        self.index.write().insert((file.into(), name.into()), entity_id.into());
    }

    pub fn get(&self, file: &str, name: &str) -> Option<String> {
        self.index.read().get(&(file.to_string(), name.to_string())).cloned()
    }
}

/// How a reference ended up resolved (§4.2 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPath {
    Entity,
    FileSymbol,
    FilePlaceholder,
    LocalIndex,
    KindName,
    ImportLocal,
    ImportName,
    ExternalLocal,
    ExternalName,
}

graphsync_core::simple_display! {
    ResolutionPath {
        Entity => "entity",
        FileSymbol => "fileSymbol",
        FilePlaceholder => "file-placeholder",
        LocalIndex => "local-index",
        KindName => "kind-name",
        ImportLocal => "import-local",
        ImportName => "import-name",
        ExternalLocal => "external-local",
        ExternalName => "external-name",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverResult {
    pub id: String,
    /// Top 5 candidates in tie-break order (local > nearby > kind-name > name).
    pub candidates: Vec<String>,
    pub resolution_path: ResolutionPath,
}

impl ResolverResult {
    pub fn ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }

    /// Metadata recorded on the relationship when ambiguous (§4.2).
    pub fn metadata(&self) -> ResolutionMetadata {
        ResolutionMetadata {
            resolved_to: Some(ResolvedTarget { id: self.id.clone() }),
            resolution_path: Some(self.resolution_path.to_string()),
            candidates: self.candidates.iter().map(|id| ResolvedTarget { id: id.clone() }).collect(),
            candidate_count: self.ambiguous().then_some(self.candidates.len()),
        }
    }
}

/// Outcome of [`Resolver::resolve_target`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// `toEntityId` already names an entity present in the graph.
    FastPath,
    Resolved(ResolverResult),
    Unresolved,
}

/// A string token form of a reference (§4.2): `file:<relPath>:<name>`,
/// `(class|interface|function|typeAlias):<name>`, `import:<module>:<name>`,
/// `external:<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    File { path: String, name: String },
    Kind { kind: String, name: String },
    Import { module: String, name: String },
    External { name: String },
}

fn parse_token(token: &str) -> Option<Token> {
    let (head, rest) = token.split_once(':')?;
    match head {
        "file" => {
            let (path, name) = rest.rsplit_once(':')?;
            Some(Token::File { path: path.to_string(), name: name.to_string() })
        }
        "import" => {
            let (module, name) = rest.rsplit_once(':')?;
            Some(Token::Import { module: module.to_string(), name: name.to_string() })
        }
        "external" => Some(Token::External { name: rest.to_string() }),
        "class" | "interface" | "function" | "typeAlias" => {
            Some(Token::Kind { kind: head.to_string(), name: rest.to_string() })
        }
        _ => None,
    }
}

pub struct Resolver {
    graph_store: Arc<dyn GraphStore>,
}

const NEARBY_K: usize = 8;
const MAX_CANDIDATES: usize = 5;

impl Resolver {
    pub fn new(graph_store: Arc<dyn GraphStore>) -> Self {
        Self { graph_store }
    }

    /// Resolve an endpoint reference given the relationship's source file
    /// (already derived by the caller — §4.2 step 1's `fromEntityId`
    /// lookup is the caller's job since only it holds the relationship).
    pub async fn resolve_ref(
        &self,
        endpoint: &EndpointRef,
        current_file_path: Option<&str>,
        local_index: &LocalSymbolIndex,
    ) -> Result<Option<ResolverResult>, AdapterError> {
        match endpoint {
            EndpointRef::Entity { id } => {
                Ok(Some(ResolverResult { id: id.clone(), candidates: vec![id.clone()], resolution_path: ResolutionPath::Entity }))
            }
            EndpointRef::FileSymbol { file, symbol, name } => {
                let name = symbol.as_deref().or(name.as_deref()).unwrap_or_default();
                self.resolve_in_file(file, name, local_index, ResolutionPath::FileSymbol).await
            }
            EndpointRef::External { name } => self.resolve_external(name, current_file_path, local_index).await,
        }
    }

    /// Resolve a relationship's target end (§4.2, §4.1.1 step 6): a
    /// structured `toRef` always takes priority; otherwise `toEntityId` is
    /// first checked as a real id already present in the graph (the fast
    /// path), and only parsed as a string token if that lookup misses.
    pub async fn resolve_target(
        &self,
        to_ref: Option<&EndpointRef>,
        to_entity_id: &str,
        current_file_path: Option<&str>,
        local_index: &LocalSymbolIndex,
    ) -> Result<ResolveOutcome, AdapterError> {
        if let Some(to_ref) = to_ref {
            return Ok(match self.resolve_ref(to_ref, current_file_path, local_index).await? {
                Some(result) => ResolveOutcome::Resolved(result),
                None => ResolveOutcome::Unresolved,
            });
        }
        if self.graph_store.get_entity(to_entity_id).await?.is_some() {
            return Ok(ResolveOutcome::FastPath);
        }
        Ok(match self.resolve_token(to_entity_id, current_file_path, local_index).await? {
            Some(result) => ResolveOutcome::Resolved(result),
            None => ResolveOutcome::Unresolved,
        })
    }

    /// Resolve a string token form (§4.2).
    pub async fn resolve_token(
        &self,
        token: &str,
        current_file_path: Option<&str>,
        local_index: &LocalSymbolIndex,
    ) -> Result<Option<ResolverResult>, AdapterError> {
        match parse_token(token) {
            Some(Token::File { path, name }) => {
                match self.resolve_in_file(&path, &name, local_index, ResolutionPath::FilePlaceholder).await? {
                    Some(r) => Ok(Some(r)),
                    None => Ok(None),
                }
            }
            Some(Token::Kind { kind, name }) => {
                let candidates = self.graph_store.find_symbol_by_kind_and_name(&kind, &name).await?;
                Ok(Self::result_from(candidates, ResolutionPath::KindName))
            }
            Some(Token::Import { module, name }) => {
                if let Some(id) = current_file_path.and_then(|f| local_index.get(f, &name)) {
                    return Ok(Some(ResolverResult { id: id.clone(), candidates: vec![id], resolution_path: ResolutionPath::ImportLocal }));
                }
                let _ = module;
                let candidates = self.graph_store.find_symbols_by_name(&name).await?;
                Ok(Self::result_from(candidates, ResolutionPath::ImportName))
            }
            Some(Token::External { name }) => self.resolve_external(&name, current_file_path, local_index).await,
            None => Ok(None),
        }
    }

    async fn resolve_in_file(
        &self,
        file: &str,
        name: &str,
        local_index: &LocalSymbolIndex,
        path: ResolutionPath,
    ) -> Result<Option<ResolverResult>, AdapterError> {
        if let Some(id) = local_index.get(file, name) {
            return Ok(Some(ResolverResult { id: id.clone(), candidates: vec![id], resolution_path: ResolutionPath::LocalIndex }));
        }
        let candidates = self.graph_store.find_symbol_in_file(file, name).await?;
        Ok(Self::result_from(candidates, path))
    }

    /// `external` ref/token: prefer local-in-file, then nearby-directory,
    /// then global-by-name (§4.2 step 1's "external" resolution order).
    async fn resolve_external(
        &self,
        name: &str,
        current_file_path: Option<&str>,
        local_index: &LocalSymbolIndex,
    ) -> Result<Option<ResolverResult>, AdapterError> {
        if let Some(file) = current_file_path {
            if let Some(id) = local_index.get(file, name) {
                return Ok(Some(ResolverResult { id: id.clone(), candidates: vec![id], resolution_path: ResolutionPath::LocalIndex }));
            }
            let local = self.graph_store.find_symbol_in_file(file, name).await?;
            if !local.is_empty() {
                return Ok(Self::result_from(local, ResolutionPath::ExternalLocal));
            }
            let nearby = self.graph_store.find_nearby_symbols(file, name, NEARBY_K).await?;
            if !nearby.is_empty() {
                return Ok(Self::result_from(nearby, ResolutionPath::ExternalLocal));
            }
        }
        let global = self.graph_store.find_symbols_by_name(name).await?;
        Ok(Self::result_from(global, ResolutionPath::ExternalName))
    }

    fn result_from(mut candidates: Vec<String>, path: ResolutionPath) -> Option<ResolverResult> {
        if candidates.is_empty() {
            return None;
        }
        candidates.truncate(MAX_CANDIDATES);
        let id = candidates[0].clone();
        Some(ResolverResult { id, candidates, resolution_path: path })
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
