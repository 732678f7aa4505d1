// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental sync flow (§4.1.2): re-parses only the changed files,
//! threading each change's effect through the Session Stream so an
//! incremental operation reads back as one coherent session rather than a
//! pile of independent writes.

use graphsync_adapters::{EntityPatch, ScanScope, WriteOptions};
use graphsync_core::{
    ChangeInfo, ChangeKind, ChangeType, CheckpointReason, CriticalChange, Event, FileChange,
    ImpactSeverity, OperationPayload, Relationship, StateTransition, SyncError, SyncErrorKind,
    SyncPhase,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::full_sync::{apply_conflict_resolution, spawn_embed_queue, write_entities};
use super::post_resolution::{self, UnresolvedRelationship};
use super::{Cancelled, OperationEngine};
use crate::resolver::{LocalSymbolIndex, ResolveOutcome};
use crate::session_stream::SessionStream;
use graphsync_core::Clock;

fn new_relationship_id() -> String {
    format!("rel-{}", nanoid::nanoid!(16))
}

/// First-hunk before/after snippet from a unified diff, each side capped at
/// 400 characters (§4.1.2). `None` when the diff carries no hunk.
fn extract_critical_change(diff: &str) -> Option<CriticalChange> {
    const SNIPPET_CAP: usize = 400;
    let mut before = String::new();
    let mut after = String::new();
    let mut in_hunk = false;
    for line in diff.lines() {
        if let Some(rest) = line.strip_prefix("@@") {
            let _ = rest;
            if in_hunk {
                break;
            }
            in_hunk = true;
            continue;
        }
        if !in_hunk {
            continue;
        }
        if let Some(rest) = line.strip_prefix('-') {
            if !rest.starts_with("--") {
                before.push_str(rest);
                before.push('\n');
            }
        } else if let Some(rest) = line.strip_prefix('+') {
            if !rest.starts_with("++") {
                after.push_str(rest);
                after.push('\n');
            }
        }
    }
    if before.is_empty() && after.is_empty() {
        return None;
    }
    let cap = |s: &str| -> String { s.trim_end().chars().take(SNIPPET_CAP).collect() };
    Some(CriticalChange { before: cap(&before), after: cap(&after) })
}

/// Allocates the session's next sequence number for `kind` and builds the
/// edge; `None` when the anomaly policy says to drop it.
fn build_session_edge<C: Clock + 'static>(
    session: &Arc<SessionStream<C>>,
    kind: &str,
    from: String,
    to: String,
    now: u64,
    change_info: Option<ChangeInfo>,
    state_transition: Option<StateTransition>,
    impact: Option<ImpactSeverity>,
) -> Option<Relationship> {
    let seq = session.next_edge_sequence(kind)?;
    let event_id = session.derive_event_id(seq, kind, &to, now);
    Some(Relationship {
        id: new_relationship_id(),
        kind: kind.to_string(),
        from_entity_id: from,
        to_entity_id: to,
        created: now,
        last_modified: now,
        version: 1,
        metadata: None,
        session_id: Some(session.session_id().to_string()),
        sequence_number: Some(seq),
        timestamp: Some(now),
        event_id: Some(event_id),
        actor: None,
        annotations: None,
        change_info,
        state_transition,
        impact,
        to_ref: None,
        from_ref: None,
        ambiguous: false,
        source_file: None,
    })
}

pub(crate) async fn run<C: Clock + 'static>(engine: &OperationEngine<C>, operation_id: &str) -> Result<(), Cancelled> {
    let changes = match engine.get_operation(operation_id).map(|op| op.payload) {
        Some(OperationPayload::Incremental { changes }) => changes,
        _ => return Ok(()),
    };

    let tuning = engine
        .get_operation(operation_id)
        .map(|op| op.effective_tuning(engine.config().default_batch_size, engine.config().default_max_concurrency))
        .unwrap_or_else(|| graphsync_core::Tuning::clamped(engine.config().default_max_concurrency, engine.config().default_batch_size));
    let timeout_ms = engine.get_operation(operation_id).map(|op| op.options.timeout_ms).unwrap_or(graphsync_core::DEFAULT_TIMEOUT_MS);

    let session = Arc::new(SessionStream::new(
        operation_id,
        engine.clock().clone(),
        engine.config().session_stream,
        engine.sequence_tracker().clone(),
        engine.events(),
    ));
    session.start(changes.len(), tuning.batch_size, tuning.max_concurrency, Duration::from_millis(timeout_ms));

    let result = run_changes(engine, operation_id, &changes, &session).await;

    let status = match &result {
        Ok(()) if engine.get_operation(operation_id).is_some_and(|op| graphsync_core::has_non_recoverable(&op.errors)) => "failed",
        Ok(()) => "completed",
        Err(Cancelled) => "cancelled",
    };
    let counters = engine
        .get_operation(operation_id)
        .map(|op| serde_json::to_value(op.counters).unwrap_or(serde_json::Value::Null))
        .unwrap_or(serde_json::Value::Null);
    let errors = engine.get_operation(operation_id).map(|op| op.errors).unwrap_or_default();
    session.teardown(status, counters, &errors);

    result
}

async fn run_changes<C: Clock + 'static>(
    engine: &OperationEngine<C>,
    operation_id: &str,
    changes: &[FileChange],
    session: &Arc<SessionStream<C>>,
) -> Result<(), Cancelled> {
    let local_index = LocalSymbolIndex::new();
    let mut unresolved: Vec<UnresolvedRelationship> = Vec::new();
    let mode = engine.get_operation(operation_id).map(|op| op.options.conflict_resolution).unwrap_or_default();
    let include_embeddings = engine.get_operation(operation_id).is_some_and(|op| op.options.include_embeddings);
    let mut to_embed: Vec<String> = Vec::new();
    let mut touched_files: HashSet<String> = HashSet::new();
    let mut touched_seeds: HashSet<String> = HashSet::new();
    let total = changes.len().max(1);

    for (i, change) in changes.iter().enumerate() {
        engine.checkpoint(operation_id).await?;
        touched_files.insert(change.file.clone());

        match change.kind {
            ChangeType::Delete => run_delete(engine, operation_id, change).await,
            ChangeType::Create | ChangeType::Modify => {
                run_create_or_modify(
                    engine,
                    operation_id,
                    change,
                    session,
                    &local_index,
                    mode,
                    include_embeddings,
                    &mut to_embed,
                    &mut unresolved,
                    &mut touched_seeds,
                )
                .await;
            }
        }

        if let Err(err) = session.flush(engine.graph_store().as_ref()).await {
            let now = engine.clock().epoch_ms();
            engine.push_error(operation_id, SyncError::new(SyncErrorKind::Database, err.to_string(), now));
        }

        let progress = (i as f64 + 1.0) / (total as f64) * 0.8;
        engine.emit_progress(operation_id, SyncPhase::Parsing, progress.min(0.8));
    }

    post_resolution::run(engine, operation_id, &local_index, unresolved).await?;

    if let Err(err) = session.flush(engine.graph_store().as_ref()).await {
        let now = engine.clock().epoch_ms();
        engine.push_error(operation_id, SyncError::new(SyncErrorKind::Database, err.to_string(), now));
    }

    if !touched_seeds.is_empty() {
        enqueue_checkpoint(engine, session, touched_seeds.into_iter().collect()).await;
    }

    if !to_embed.is_empty() {
        spawn_embed_queue(engine, to_embed);
    }

    if let Err(err) = engine
        .graph_store()
        .finalize_scan(ScanScope { files: touched_files.into_iter().collect(), scan_start: engine.clock().epoch_ms() })
        .await
    {
        let now = engine.clock().epoch_ms();
        engine.push_error(operation_id, SyncError::new(SyncErrorKind::Database, err.to_string(), now).with_recoverable(true));
    }

    engine.emit_progress(operation_id, SyncPhase::Completed, 1.0);
    Ok(())
}

async fn run_delete<C: Clock + 'static>(engine: &OperationEngine<C>, operation_id: &str, change: &FileChange) {
    let entities = match engine.graph_store().get_entities_by_file(&change.file, true).await {
        Ok(entities) => entities,
        Err(err) => {
            let now = engine.clock().epoch_ms();
            engine.push_error(
                operation_id,
                SyncError::new(SyncErrorKind::Database, err.to_string(), now).with_file(change.file.clone()).with_recoverable(false),
            );
            return;
        }
    };
    let entity_ids: Vec<String> = entities.iter().map(|e| e.id.clone()).collect();
    engine.snapshot_for_rollback(operation_id, &entity_ids).await;
    for entity in entities {
        match engine.graph_store().delete_entity(&entity.id).await {
            Ok(()) => engine.add_counters(operation_id, |c| c.entities_deleted += 1),
            Err(err) => {
                let now = engine.clock().epoch_ms();
                engine.push_error(
                    operation_id,
                    SyncError::new(SyncErrorKind::Database, err.to_string(), now).with_file(change.file.clone()).with_recoverable(false),
                );
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_create_or_modify<C: Clock + 'static>(
    engine: &OperationEngine<C>,
    operation_id: &str,
    change: &FileChange,
    session: &Arc<SessionStream<C>>,
    local_index: &LocalSymbolIndex,
    mode: graphsync_core::ConflictResolutionMode,
    include_embeddings: bool,
    to_embed: &mut Vec<String>,
    unresolved: &mut Vec<UnresolvedRelationship>,
    touched_seeds: &mut HashSet<String>,
) {
    let parsed = match engine.parser().parse_file_incremental(&change.file).await {
        Ok(parsed) => parsed,
        Err(err) => {
            let now = engine.clock().epoch_ms();
            engine.push_error(
                operation_id,
                SyncError::new(SyncErrorKind::Parse, err.to_string(), now).with_file(change.file.clone()).with_recoverable(false),
            );
            return;
        }
    };

    let mut entities = parsed.entities.clone();
    apply_conflict_resolution(engine, operation_id, mode, &mut entities).await;

    for entity in &entities {
        if let Some(name) = &entity.name {
            local_index.insert(entity.file.clone(), name.clone(), entity.id.clone());
        }
    }

    to_embed.extend(entities.iter().map(|e| e.id.clone()));
    let (updates, creates): (Vec<_>, Vec<_>) = entities.into_iter().partition(|e| parsed.updated_entities.contains(&e.id));

    let update_ids: Vec<String> = updates.iter().map(|e| e.id.clone()).collect();
    engine.snapshot_for_rollback(operation_id, &update_ids).await;

    for entity in &updates {
        match engine.graph_store().update_entity(&entity.id, EntityPatch { data: entity.data.clone() }, WriteOptions::default()).await {
            Ok(()) => {
                engine.add_counters(operation_id, |c| c.entities_updated += 1);
                touched_seeds.insert(entity.id.clone());
            }
            Err(err) => {
                let now = engine.clock().epoch_ms();
                engine.push_error(
                    operation_id,
                    SyncError::new(SyncErrorKind::Database, err.to_string(), now).with_file(change.file.clone()).with_recoverable(true),
                );
            }
        }
    }
    if !creates.is_empty() {
        write_entities(engine, operation_id, &creates).await;
        touched_seeds.extend(creates.iter().map(|e| e.id.clone()));
    }

    if include_embeddings {
        let ids: Vec<String> = to_embed.drain(..).collect();
        if !ids.is_empty() {
            if let Err(err) = engine.graph_store().create_embeddings_batch(ids).await {
                let now = engine.clock().epoch_ms();
                engine.push_error(operation_id, SyncError::new(SyncErrorKind::Capability, err.to_string(), now));
            }
        }
    }

    for rel in &parsed.relationships {
        let mut rel = rel.clone();
        let current_file = rel.source_file.clone().or_else(|| Some(change.file.clone()));
        match post_resolution::try_resolve(engine, local_index, &mut rel, current_file.as_deref()).await {
            Ok(true) => match engine.graph_store().create_relationship(rel, true).await {
                Ok(_) => engine.add_counters(operation_id, |c| c.relationships_created += 1),
                Err(err) => {
                    let now = engine.clock().epoch_ms();
                    engine.push_error(operation_id, SyncError::new(SyncErrorKind::Database, err.to_string(), now).with_recoverable(true));
                }
            },
            Ok(false) => unresolved.push(UnresolvedRelationship { relationship: rel, current_file }),
            Err(err) => {
                let now = engine.clock().epoch_ms();
                engine.push_error(operation_id, SyncError::new(SyncErrorKind::Database, err.to_string(), now));
            }
        }
    }

    if parsed.is_incremental {
        apply_session_edges(engine, operation_id, change, session, local_index, &parsed, touched_seeds).await;
    }
}

async fn apply_session_edges<C: Clock + 'static>(
    engine: &OperationEngine<C>,
    operation_id: &str,
    change: &FileChange,
    session: &Arc<SessionStream<C>>,
    local_index: &LocalSymbolIndex,
    parsed: &graphsync_adapters::IncrementalParseResult,
    touched_seeds: &mut HashSet<String>,
) {
    let now = engine.clock().epoch_ms();
    let change_id = change.change_id.clone().unwrap_or_else(|| format!("chg-{operation_id}-{now}"));

    let commit = engine.git_provider().get_last_commit_info(&change.file).await.ok();
    let diff = engine.git_provider().get_unified_diff(&change.file, 3).await.ok();
    let critical_change = diff.as_deref().and_then(extract_critical_change);

    for entity_id in &parsed.updated_entities {
        touched_seeds.insert(entity_id.clone());
        if let Err(err) = engine.graph_store().append_version(entity_id, now, &change_id).await {
            engine.push_error(operation_id, SyncError::new(SyncErrorKind::Database, err.to_string(), now).with_recoverable(true));
        }

        let change_info = ChangeInfo {
            kind: ChangeKind::Modified,
            change_id: change_id.clone(),
            commit_hash: commit.as_ref().map(|c| c.hash.clone()),
            commit_author: commit.as_ref().map(|c| c.author.clone()),
        };

        if let Some(edge) =
            build_session_edge(session, "MODIFIED_IN", entity_id.clone(), change_id.clone(), now, Some(change_info.clone()), None, None)
        {
            session.buffer_relationship(edge);
        }

        if let Some(mut edge) = build_session_edge(session, "MODIFIED_BY", entity_id.clone(), session.session_id().to_string(), now, None, None, None) {
            edge.actor = commit.as_ref().map(|c| c.author.clone());
            session.buffer_relationship(edge);
        }

        let mut state_transition = StateTransition::default_for_modification();
        state_transition.critical_change = critical_change.clone();
        if let Some(edge) = build_session_edge(
            session,
            "SESSION_MODIFIED",
            entity_id.clone(),
            session.session_id().to_string(),
            now,
            Some(change_info),
            Some(state_transition),
            None,
        ) {
            session.buffer_relationship(edge);
        }
        if let Some(edge) = build_session_edge(
            session,
            "SESSION_IMPACTED",
            entity_id.clone(),
            session.session_id().to_string(),
            now,
            None,
            None,
            Some(ImpactSeverity::Medium),
        ) {
            session.buffer_relationship(edge);
        }
    }

    for entity_id in &parsed.added_entities {
        touched_seeds.insert(entity_id.clone());
        let change_info = ChangeInfo { kind: ChangeKind::Created, change_id: change_id.clone(), commit_hash: None, commit_author: None };
        if let Some(edge) =
            build_session_edge(session, "CREATED_IN", entity_id.clone(), change_id.clone(), now, Some(change_info), None, None)
        {
            session.buffer_relationship(edge);
        }
        if let Some(edge) = build_session_edge(
            session,
            "SESSION_IMPACTED",
            entity_id.clone(),
            session.session_id().to_string(),
            now,
            None,
            None,
            Some(ImpactSeverity::Low),
        ) {
            session.buffer_relationship(edge);
        }
    }

    engine.snapshot_for_rollback(operation_id, &parsed.removed_entities).await;
    for entity_id in &parsed.removed_entities {
        let change_info = ChangeInfo { kind: ChangeKind::Removed, change_id: change_id.clone(), commit_hash: None, commit_author: None };
        if let Some(edge) =
            build_session_edge(session, "REMOVED_IN", entity_id.clone(), change_id.clone(), now, Some(change_info), None, None)
        {
            session.buffer_relationship(edge);
        }
        if let Some(edge) = build_session_edge(
            session,
            "SESSION_IMPACTED",
            entity_id.clone(),
            session.session_id().to_string(),
            now,
            None,
            None,
            Some(ImpactSeverity::High),
        ) {
            session.buffer_relationship(edge);
        }
        match engine.graph_store().delete_entity(entity_id).await {
            Ok(()) => engine.add_counters(operation_id, |c| c.entities_deleted += 1),
            Err(err) => engine.push_error(operation_id, SyncError::new(SyncErrorKind::Database, err.to_string(), now).with_recoverable(true)),
        }
    }

    for rel in &parsed.added_relationships {
        resolve_and_open_edge(engine, operation_id, local_index, &change.file, &change_id, now, rel).await;
    }
    for rel in &parsed.removed_relationships {
        resolve_and_close_edge(engine, operation_id, local_index, &change.file, &change_id, now, rel).await;
    }
}

async fn resolve_placeholder<C: Clock + 'static>(
    engine: &OperationEngine<C>,
    local_index: &LocalSymbolIndex,
    current_file: &str,
    rel: &Relationship,
) -> Option<String> {
    match engine.resolver().resolve_target(rel.to_ref.as_ref(), &rel.to_entity_id, Some(current_file), local_index).await {
        Ok(ResolveOutcome::FastPath) => Some(rel.to_entity_id.clone()),
        Ok(ResolveOutcome::Resolved(result)) => Some(result.id),
        _ => None,
    }
}

async fn resolve_and_open_edge<C: Clock + 'static>(
    engine: &OperationEngine<C>,
    operation_id: &str,
    local_index: &LocalSymbolIndex,
    current_file: &str,
    change_id: &str,
    now: u64,
    rel: &Relationship,
) {
    let Some(to_id) = resolve_placeholder(engine, local_index, current_file, rel).await else {
        engine.push_error(
            operation_id,
            SyncError::new(SyncErrorKind::Unknown, format!("could not resolve reference for added relationship {}", rel.id), now)
                .with_recoverable(true),
        );
        return;
    };
    match engine.graph_store().open_edge(&rel.from_entity_id, &to_id, &rel.kind, now, change_id).await {
        Ok(_edge_id) => {
            let mut evidence = rel.clone();
            evidence.to_entity_id = to_id;
            if let Err(err) = engine.graph_store().upsert_edge_evidence_bulk(vec![evidence]).await {
                engine.push_error(operation_id, SyncError::new(SyncErrorKind::Database, err.to_string(), now).with_recoverable(true));
            } else {
                engine.add_counters(operation_id, |c| c.relationships_created += 1);
            }
        }
        Err(err) => engine.push_error(operation_id, SyncError::new(SyncErrorKind::Database, err.to_string(), now).with_recoverable(true)),
    }
}

async fn resolve_and_close_edge<C: Clock + 'static>(
    engine: &OperationEngine<C>,
    operation_id: &str,
    local_index: &LocalSymbolIndex,
    current_file: &str,
    change_id: &str,
    now: u64,
    rel: &Relationship,
) {
    let Some(to_id) = resolve_placeholder(engine, local_index, current_file, rel).await else {
        engine.push_error(
            operation_id,
            SyncError::new(SyncErrorKind::Unknown, format!("could not resolve reference for removed relationship {}", rel.id), now)
                .with_recoverable(true),
        );
        return;
    };
    match engine.graph_store().close_edge(&rel.from_entity_id, &to_id, &rel.kind, now, change_id).await {
        Ok(()) => engine.add_counters(operation_id, |c| c.relationships_deleted += 1),
        Err(err) => engine.push_error(operation_id, SyncError::new(SyncErrorKind::Database, err.to_string(), now).with_recoverable(true)),
    }
}

/// Enqueues a checkpoint over every seed entity touched by this operation's
/// changes (§4.1.2, §4.5: `reason=manual`, default `hopCount=2`). A failure
/// surfaces as a `session_checkpoint{status=manual_intervention}` event
/// rather than failing the operation (§4.5 "annotate-on-enqueue-failure").
async fn enqueue_checkpoint<C: Clock + 'static>(engine: &OperationEngine<C>, session: &Arc<SessionStream<C>>, seeds: Vec<String>) {
    match engine.checkpoint_runner().enqueue(session.session_id(), seeds.clone(), CheckpointReason::Manual, "incremental-sync").await {
        Ok(job_id) => {
            session.publish_checkpoint_scheduled(&job_id, &seeds);
            engine.public_emit(Event::CheckpointScheduled { job_id, session_id: session.session_id().to_string() });
        }
        Err(err) => {
            let error = err.to_string();
            let annotation = graphsync_adapters::CheckpointAnnotation {
                status: "manual_intervention".to_string(),
                reason: Some("manual".to_string()),
                hop_count: Some(2),
                job_id: None,
                error: Some(error.clone()),
                triggered_by: "incremental-sync".to_string(),
            };
            if let Err(annotate_err) =
                engine.graph_store().annotate_session_relationships_with_checkpoint(session.session_id(), seeds.clone(), annotation).await
            {
                tracing::warn!(session_id = session.session_id(), error = %annotate_err, "failed to annotate session relationships after checkpoint enqueue failure");
            }
            session.publish_manual_intervention(&seeds, &error);
            engine.public_emit(Event::CheckpointScheduleFailed { session_id: session.session_id().to_string(), error });
        }
    }
}
