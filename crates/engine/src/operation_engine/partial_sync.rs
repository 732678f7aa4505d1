// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Partial sync flow (§4.1.3): applies a caller-supplied batch of entity-level
//! updates directly, with no re-parsing and no session stream — the
//! lightest-weight of the three flows.

use graphsync_adapters::{EntityPatch, WriteOptions};
use graphsync_core::{OperationPayload, PartialUpdate, PartialUpdateType, SyncError, SyncErrorKind, SyncPhase};

use super::{Cancelled, OperationEngine};
use graphsync_core::Clock;

pub(crate) async fn run<C: Clock + 'static>(engine: &OperationEngine<C>, operation_id: &str) -> Result<(), Cancelled> {
    let updates = match engine.get_operation(operation_id).map(|op| op.payload) {
        Some(OperationPayload::Partial { updates }) => updates,
        _ => return Ok(()),
    };

    let total = updates.len().max(1);
    for (i, update) in updates.iter().enumerate() {
        engine.checkpoint(operation_id).await?;
        apply_update(engine, operation_id, update).await;

        let progress = (i as f64 + 1.0) / (total as f64) * 0.9;
        engine.emit_progress(operation_id, SyncPhase::Parsing, progress.min(0.9));
    }

    engine.emit_progress(operation_id, SyncPhase::Completed, 1.0);
    Ok(())
}

async fn apply_update<C: Clock + 'static>(engine: &OperationEngine<C>, operation_id: &str, update: &PartialUpdate) {
    let now = engine.clock().epoch_ms();
    engine.snapshot_for_rollback(operation_id, std::slice::from_ref(&update.entity_id)).await;
    match update.kind {
        PartialUpdateType::Create => {
            let entity = graphsync_adapters::Entity {
                id: update.entity_id.clone(),
                file: String::new(),
                kind: "entity".to_string(),
                name: None,
                data: update.new_value.clone().unwrap_or(serde_json::Value::Null),
            };
            match engine.graph_store().create_entity(entity, WriteOptions::default()).await {
                Ok(_) => engine.add_counters(operation_id, |c| c.entities_created += 1),
                Err(err) => engine.push_error(
                    operation_id,
                    SyncError::new(SyncErrorKind::Database, err.to_string(), now).with_file(update.entity_id.clone()).with_recoverable(true),
                ),
            }
        }
        PartialUpdateType::Update => {
            let data = update.changes.clone().or_else(|| update.new_value.clone()).unwrap_or(serde_json::Value::Null);
            match engine.graph_store().update_entity(&update.entity_id, EntityPatch { data }, WriteOptions::default()).await {
                Ok(()) => engine.add_counters(operation_id, |c| c.entities_updated += 1),
                Err(err) => engine.push_error(
                    operation_id,
                    SyncError::new(SyncErrorKind::Database, err.to_string(), now).with_file(update.entity_id.clone()).with_recoverable(true),
                ),
            }
        }
        PartialUpdateType::Delete => match engine.graph_store().delete_entity(&update.entity_id).await {
            Ok(()) => engine.add_counters(operation_id, |c| c.entities_deleted += 1),
            Err(err) => engine.push_error(
                operation_id,
                SyncError::new(SyncErrorKind::Database, err.to_string(), now).with_file(update.entity_id.clone()).with_recoverable(true),
            ),
        },
    }
}
