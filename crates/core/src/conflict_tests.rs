// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn sample(resolved: bool, resolution: Option<ConflictResolution>) -> Conflict {
    Conflict {
        id: ConflictId::new(),
        kind: ConflictType::EntityVersion,
        entity_id: Some("ent-1".into()),
        relationship_id: None,
        conflicting_values: ConflictingValues { current: json!({"v": 1}), incoming: json!({"v": 2}) },
        diff: json!({"v": {"from": 1, "to": 2}}),
        signature: "sig".into(),
        timestamp: 100,
        resolved,
        resolution,
        resolution_strategy: None,
    }
}

#[test]
fn resolved_without_resolution_is_invalid() {
    let conflict = sample(true, None);
    assert!(!conflict.is_valid());
}

#[test]
fn unresolved_without_resolution_is_valid() {
    let conflict = sample(false, None);
    assert!(conflict.is_valid());
}

#[test]
fn mark_resolved_sets_strategy_and_flag() {
    let mut conflict = sample(false, None);
    conflict.mark_resolved(ConflictResolution {
        strategy: ResolutionStrategy::Overwrite,
        resolved_value: Some(json!({"v": 2})),
        manual_resolution: None,
        timestamp: 200,
        resolved_by: "auto".into(),
    });
    assert!(conflict.resolved);
    assert!(conflict.is_valid());
    assert_eq!(conflict.resolution_strategy, Some(ResolutionStrategy::Overwrite));
}

#[test]
fn diff_signature_is_deterministic_over_same_canonical_diff() {
    let diff = json!({"a": 1, "b": 2});
    let sig1 = diff_signature(ConflictType::EntityVersion, "ent-1", &diff);
    let sig2 = diff_signature(ConflictType::EntityVersion, "ent-1", &diff);
    assert_eq!(sig1, sig2);
}

#[test]
fn diff_signature_differs_across_target_or_kind() {
    let diff = json!({"a": 1});
    let sig_a = diff_signature(ConflictType::EntityVersion, "ent-1", &diff);
    let sig_b = diff_signature(ConflictType::EntityVersion, "ent-2", &diff);
    let sig_c = diff_signature(ConflictType::RelationshipConflict, "ent-1", &diff);
    assert_ne!(sig_a, sig_b);
    assert_ne!(sig_a, sig_c);
}
