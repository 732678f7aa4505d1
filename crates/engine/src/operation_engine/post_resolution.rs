// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The post-resolution pass shared by the full and incremental flows
//! (§4.1.4): a final retry over relationships the batch loop could not
//! resolve the first time, since a later file/change may have created the
//! entity an earlier one referenced.

use graphsync_adapters::AdapterError;
use graphsync_core::{Relationship, SyncError, SyncErrorKind, SyncPhase};

use super::{Cancelled, OperationEngine};
use crate::resolver::{LocalSymbolIndex, ResolveOutcome};
use graphsync_core::Clock;

/// One relationship the batch loop could not resolve on first attempt.
pub(crate) struct UnresolvedRelationship {
    pub relationship: Relationship,
    pub current_file: Option<String>,
}

/// Attempts resolution against the shared local index, covering both the
/// structured `toRef` and the `toEntityId`-as-token form (§4.2), and on
/// success rewrites `relationship.to_entity_id` (and ambiguity metadata).
/// Returns `true` if the relationship is now resolved, whether via the fast
/// path, a structured ref, or a parsed token.
pub(crate) async fn try_resolve<C: Clock + 'static>(
    engine: &OperationEngine<C>,
    local_index: &LocalSymbolIndex,
    relationship: &mut Relationship,
    current_file: Option<&str>,
) -> Result<bool, AdapterError> {
    let to_ref = relationship.to_ref.clone();
    let to_entity_id = relationship.to_entity_id.clone();
    let outcome = engine.resolver().resolve_target(to_ref.as_ref(), &to_entity_id, current_file, local_index).await?;
    match outcome {
        ResolveOutcome::FastPath => Ok(true),
        ResolveOutcome::Resolved(result) => {
            relationship.to_entity_id = result.id.clone();
            if result.ambiguous() {
                relationship.ambiguous = true;
                relationship.metadata = Some(result.metadata());
            }
            Ok(true)
        }
        ResolveOutcome::Unresolved => Ok(false),
    }
}

/// Drains `unresolved`, retrying resolution and creating each relationship
/// that succeeds; emits `{phase=resolving_relationships}` once up front
/// rather than per item, since this pass is typically small relative to the
/// batch loop it follows.
pub(crate) async fn run<C: Clock + 'static>(
    engine: &OperationEngine<C>,
    operation_id: &str,
    local_index: &LocalSymbolIndex,
    unresolved: Vec<UnresolvedRelationship>,
) -> Result<(), Cancelled> {
    if unresolved.is_empty() {
        return Ok(());
    }
    engine.emit_progress(operation_id, SyncPhase::ResolvingRelationships, engine.config().post_resolution_progress);

    for mut item in unresolved {
        engine.checkpoint(operation_id).await?;
        let now = engine.clock().epoch_ms();
        let outcome = try_resolve(engine, local_index, &mut item.relationship, item.current_file.as_deref()).await;
        match outcome {
            Ok(true) => {
                match engine.graph_store().create_relationship(item.relationship.clone(), true).await {
                    Ok(id) => {
                        if let Some(point) = engine.get_operation(operation_id).and_then(|op| op.rollback_point) {
                            engine.rollback().record_relationship_created(&point, id);
                        }
                        engine.add_counters(operation_id, |c| c.relationships_created += 1);
                    }
                    Err(err) => {
                        engine.push_error(
                            operation_id,
                            SyncError::new(SyncErrorKind::Database, err.to_string(), now)
                                .with_file(item.relationship.source_file.clone().unwrap_or_default()),
                        );
                    }
                }
            }
            Ok(false) => {
                engine.push_error(
                    operation_id,
                    SyncError::new(
                        SyncErrorKind::Unknown,
                        format!("could not resolve reference for relationship {}", item.relationship.id),
                        now,
                    )
                    .with_recoverable(true),
                );
            }
            Err(err) => {
                engine.push_error(operation_id, SyncError::new(SyncErrorKind::Database, err.to_string(), now));
            }
        }
    }

    Ok(())
}
