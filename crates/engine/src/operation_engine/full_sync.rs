// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Full sync flow (§4.1.1): re-parses every file the [`Parser`] reports,
//! batching by the operation's effective tuning, then resolves and writes
//! whatever the batch loop produced.

use graphsync_adapters::{BulkWriteOptions, Entity, ScanScope, WriteOptions};
use graphsync_core::{
    ConflictResolutionMode, Event, Relationship, ResolutionStrategy, SyncError, SyncErrorKind,
    SyncPhase,
};
use std::collections::HashSet;

use super::post_resolution::{self, UnresolvedRelationship};
use super::{Cancelled, OperationEngine};
use crate::conflict_detector::ConflictResolver;
use crate::resolver::LocalSymbolIndex;
use graphsync_core::Clock;

fn strategy_for(mode: ConflictResolutionMode) -> ResolutionStrategy {
    match mode {
        ConflictResolutionMode::Overwrite => ResolutionStrategy::Overwrite,
        ConflictResolutionMode::Merge => ResolutionStrategy::Merge,
        ConflictResolutionMode::Skip => ResolutionStrategy::Skip,
        ConflictResolutionMode::Manual => ResolutionStrategy::Manual,
    }
}

pub(crate) async fn run<C: Clock + 'static>(engine: &OperationEngine<C>, operation_id: &str) -> Result<(), Cancelled> {
    // Step 1: best-effort module indexing. Never fails the operation.
    match engine.module_indexer().index_root_package().await {
        Ok(count) => tracing::info!(operation_id, modules = count, "module indexing completed"),
        Err(err) => tracing::warn!(operation_id, error = %err, "module indexing failed, continuing"),
    }

    engine.checkpoint(operation_id).await?;

    // Step 2: enumerate the root package's files.
    let files = match engine.parser().list_files().await {
        Ok(files) => files,
        Err(err) => {
            let now = engine.clock().epoch_ms();
            engine.push_error(operation_id, SyncError::new(SyncErrorKind::Parse, err.to_string(), now).with_recoverable(false));
            return Ok(());
        }
    };

    let local_index = LocalSymbolIndex::new();
    let mut unresolved: Vec<UnresolvedRelationship> = Vec::new();
    let mode = engine.get_operation(operation_id).map(|op| op.options.conflict_resolution).unwrap_or_default();
    let include_embeddings = engine.get_operation(operation_id).is_some_and(|op| op.options.include_embeddings);
    let mut to_embed: Vec<String> = Vec::new();

    let tuning = engine
        .get_operation(operation_id)
        .map(|op| op.effective_tuning(engine.config().default_batch_size, engine.config().default_max_concurrency))
        .unwrap_or_else(|| graphsync_core::Tuning::clamped(engine.config().default_max_concurrency, engine.config().default_batch_size));
    let batches: Vec<&[String]> = files.chunks(tuning.batch_size.max(1) as usize).collect();
    let total_batches = batches.len().max(1);

    for (i, batch) in batches.into_iter().enumerate() {
        engine.checkpoint(operation_id).await?;

        let tuning = engine
            .get_operation(operation_id)
            .map(|op| op.effective_tuning(engine.config().default_batch_size, engine.config().default_max_concurrency))
            .unwrap_or(tuning);

        let (mut batch_entities, mut batch_relationships) = parse_batch(engine, operation_id, batch, &local_index, tuning.max_concurrency).await;

        apply_conflict_resolution(engine, operation_id, mode, &mut batch_entities).await;

        if !batch_entities.is_empty() {
            write_entities(engine, operation_id, &batch_entities).await;
        }

        let mut i2 = 0;
        while i2 < batch_relationships.len() {
            let current_file = batch_relationships[i2].source_file.clone();
            let mut rel = batch_relationships.remove(i2);
            match post_resolution::try_resolve(engine, &local_index, &mut rel, current_file.as_deref()).await {
                Ok(true) => {
                    batch_relationships.insert(i2, rel);
                    i2 += 1;
                }
                Ok(false) => unresolved.push(UnresolvedRelationship { relationship: rel, current_file }),
                Err(err) => {
                    let now = engine.clock().epoch_ms();
                    engine.push_error(operation_id, SyncError::new(SyncErrorKind::Database, err.to_string(), now));
                }
            }
        }

        if !batch_relationships.is_empty() {
            write_relationships(engine, operation_id, &batch_relationships).await;
        }

        if include_embeddings && !batch_entities.is_empty() {
            let ids: Vec<String> = batch_entities.iter().map(|e| e.id.clone()).collect();
            if let Err(err) = engine.graph_store().create_embeddings_batch(ids).await {
                let now = engine.clock().epoch_ms();
                engine.push_error(operation_id, SyncError::new(SyncErrorKind::Capability, err.to_string(), now));
            }
        } else {
            to_embed.extend(batch_entities.iter().map(|e| e.id.clone()));
        }

        engine.mutate_operation(operation_id, |op| op.counters.files_processed += batch.len() as u64);
        let progress = 0.2 + (i as f64 + 1.0) / (total_batches as f64) * 0.8;
        engine.emit_progress(operation_id, SyncPhase::Parsing, progress.min(1.0));
    }

    post_resolution::run(engine, operation_id, &local_index, unresolved).await?;

    if let Err(err) = engine.graph_store().finalize_scan(ScanScope { files: files.clone(), scan_start: engine.clock().epoch_ms() }).await {
        let now = engine.clock().epoch_ms();
        engine.push_error(operation_id, SyncError::new(SyncErrorKind::Database, err.to_string(), now).with_recoverable(true));
    }

    if !to_embed.is_empty() {
        spawn_embed_queue(engine, to_embed);
    }

    engine.emit_progress(operation_id, SyncPhase::Completed, 1.0);
    Ok(())
}

async fn parse_batch<C: Clock + 'static>(
    engine: &OperationEngine<C>,
    operation_id: &str,
    batch: &[String],
    local_index: &LocalSymbolIndex,
    max_concurrency: u32,
) -> (Vec<Entity>, Vec<Relationship>) {
    let mut entities = Vec::new();
    let mut relationships = Vec::new();

    for chunk in batch.chunks(max_concurrency.max(1) as usize) {
        let mut tasks = tokio::task::JoinSet::new();
        for file in chunk {
            let parser = engine.parser().clone();
            let file = file.clone();
            tasks.spawn(async move {
                let result = parser.parse_file(&file).await;
                (file, result)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            let Ok((file, result)) = joined else { continue };
            match result {
                Ok(parsed) => {
                    for entity in &parsed.entities {
                        if let Some(name) = &entity.name {
                            local_index.insert(entity.file.clone(), name.clone(), entity.id.clone());
                        }
                    }
                    entities.extend(parsed.entities);
                    relationships.extend(parsed.relationships.into_iter().map(|mut r| {
                        r.source_file.get_or_insert(file.clone());
                        r
                    }));
                }
                Err(err) => {
                    let now = engine.clock().epoch_ms();
                    engine.push_error(
                        operation_id,
                        SyncError::new(SyncErrorKind::Parse, err.to_string(), now).with_file(file).with_recoverable(true),
                    );
                }
            }
        }
    }

    (entities, relationships)
}

pub(crate) async fn apply_conflict_resolution<C: Clock + 'static>(
    engine: &OperationEngine<C>,
    operation_id: &str,
    mode: ConflictResolutionMode,
    entities: &mut Vec<Entity>,
) {
    if entities.is_empty() {
        return;
    }
    let now = engine.clock().epoch_ms();
    let mut conflicts = match engine.conflict_detector().detect_entity_conflicts(entities.as_slice(), now).await {
        Ok(conflicts) => conflicts,
        Err(err) => {
            engine.push_error(operation_id, SyncError::new(SyncErrorKind::Conflict, err.to_string(), now));
            return;
        }
    };
    if conflicts.is_empty() {
        return;
    }

    let mut skip_ids: HashSet<String> = HashSet::new();
    for conflict in conflicts.iter_mut() {
        let Some(entity_id) = conflict.entity_id.clone() else { continue };
        if mode == ConflictResolutionMode::Manual {
            skip_ids.insert(entity_id);
            continue;
        }
        let resolution = ConflictResolver::resolve_auto(conflict, strategy_for(mode), now, "operation-engine");
        match &resolution.resolved_value {
            Some(value) => {
                if let Some(entity) = entities.iter_mut().find(|e| e.id == entity_id) {
                    entity.data = value.clone();
                }
            }
            None => {
                skip_ids.insert(entity_id);
            }
        }
        conflict.mark_resolved(resolution);
    }

    engine.mutate_operation(operation_id, |op| op.upsert_conflicts(conflicts.clone()));
    engine.public_emit(Event::ConflictsDetected { operation_id: operation_id.to_string(), conflicts });
    entities.retain(|e| !skip_ids.contains(&e.id));
}

pub(crate) async fn write_entities<C: Clock + 'static>(engine: &OperationEngine<C>, operation_id: &str, entities: &[Entity]) {
    let entity_ids: Vec<String> = entities.iter().map(|e| e.id.clone()).collect();
    engine.snapshot_for_rollback(operation_id, &entity_ids).await;

    match engine.graph_store().create_entities_bulk(entities.to_vec(), BulkWriteOptions::default()).await {
        Ok(outcome) => {
            engine.add_counters(operation_id, |c| c.entities_created += outcome.succeeded.len() as u64);
            for (id, message) in outcome.failed {
                let now = engine.clock().epoch_ms();
                engine.push_error(operation_id, SyncError::new(SyncErrorKind::Database, message, now).with_file(id).with_recoverable(true));
            }
        }
        Err(_) => {
            for entity in entities {
                match engine.graph_store().create_entity(entity.clone(), WriteOptions::default()).await {
                    Ok(_) => engine.add_counters(operation_id, |c| c.entities_created += 1),
                    Err(err) => {
                        let now = engine.clock().epoch_ms();
                        engine.push_error(
                            operation_id,
                            SyncError::new(SyncErrorKind::Database, err.to_string(), now).with_file(entity.file.clone()).with_recoverable(true),
                        );
                    }
                };
            }
        }
    }
}

pub(crate) async fn write_relationships<C: Clock + 'static>(engine: &OperationEngine<C>, operation_id: &str, relationships: &[Relationship]) {
    match engine.graph_store().create_relationships_bulk(relationships.to_vec(), BulkWriteOptions::default()).await {
        Ok(outcome) => {
            engine.add_counters(operation_id, |c| c.relationships_created += outcome.succeeded.len() as u64);
            if let Some(point) = engine.get_operation(operation_id).and_then(|op| op.rollback_point) {
                for id in &outcome.succeeded {
                    engine.rollback().record_relationship_created(&point, id.clone());
                }
            }
            for (id, message) in outcome.failed {
                let now = engine.clock().epoch_ms();
                engine.push_error(operation_id, SyncError::new(SyncErrorKind::Database, message, now).with_file(id).with_recoverable(true));
            }
        }
        Err(_) => {
            for rel in relationships {
                match engine.graph_store().create_relationship(rel.clone(), true).await {
                    Ok(id) => {
                        engine.add_counters(operation_id, |c| c.relationships_created += 1);
                        if let Some(point) = engine.get_operation(operation_id).and_then(|op| op.rollback_point) {
                            engine.rollback().record_relationship_created(&point, id);
                        }
                    }
                    Err(err) => {
                        let now = engine.clock().epoch_ms();
                        engine.push_error(operation_id, SyncError::new(SyncErrorKind::Database, err.to_string(), now).with_recoverable(true));
                    }
                }
            }
        }
    }
}

/// Background chunked embedding pass for entities deferred during the batch
/// loop (`include_embeddings=false`). Failures are logged only — embeddings
/// never affect operation status (§4.1.1 step 11).
pub(crate) fn spawn_embed_queue<C: Clock + 'static>(engine: &OperationEngine<C>, entity_ids: Vec<String>) {
    let graph_store = engine.graph_store().clone();
    let chunk_size = engine.config().embed_chunk_size;
    tokio::spawn(async move {
        for chunk in entity_ids.chunks(chunk_size.max(1)) {
            if let Err(err) = graph_store.create_embeddings_batch(chunk.to_vec()).await {
                tracing::warn!(error = %err, count = chunk.len(), "deferred embedding batch failed");
            }
        }
    });
}
