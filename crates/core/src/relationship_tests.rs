// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn base_relationship() -> Relationship {
    Relationship {
        id: "rel-1".into(),
        kind: "CALLS".into(),
        from_entity_id: "ent-a".into(),
        to_entity_id: "ent-b".into(),
        created: 1,
        last_modified: 1,
        version: 1,
        metadata: None,
        session_id: None,
        sequence_number: None,
        timestamp: None,
        event_id: None,
        actor: None,
        annotations: None,
        change_info: None,
        state_transition: None,
        impact: None,
        to_ref: None,
        from_ref: None,
        ambiguous: false,
        source_file: None,
    }
}

#[test]
fn no_metadata_is_consistent_by_default() {
    let rel = base_relationship();
    assert!(rel.resolution_is_consistent());
}

#[test]
fn matching_resolved_to_is_consistent() {
    let mut rel = base_relationship();
    rel.metadata = Some(ResolutionMetadata {
        resolved_to: Some(ResolvedTarget { id: "ent-b".into() }),
        ..Default::default()
    });
    assert!(rel.resolution_is_consistent());
}

#[test]
fn mismatched_resolved_to_is_inconsistent() {
    let mut rel = base_relationship();
    rel.metadata = Some(ResolutionMetadata {
        resolved_to: Some(ResolvedTarget { id: "ent-z".into() }),
        ..Default::default()
    });
    assert!(!rel.resolution_is_consistent());
}

#[test]
fn endpoint_ref_name_prefers_symbol_over_name() {
    let r = EndpointRef::FileSymbol {
        file: "src/a.rs".into(),
        symbol: Some("Foo".into()),
        name: Some("ignored".into()),
    };
    assert_eq!(r.name(), Some("Foo"));
    assert_eq!(r.file(), Some("src/a.rs"));
}

#[test]
fn endpoint_ref_entity_has_no_name_or_file() {
    let r = EndpointRef::Entity { id: "ent-1".into() };
    assert_eq!(r.name(), None);
    assert_eq!(r.file(), None);
}

#[test]
fn default_state_transition_matches_spec_defaults() {
    let st = StateTransition::default_for_modification();
    assert_eq!(st.from, "unknown");
    assert_eq!(st.to, "working");
    assert_eq!(st.verified_by, "manual");
    assert_eq!(st.confidence, 0.5);
    assert!(st.critical_change.is_none());
}
