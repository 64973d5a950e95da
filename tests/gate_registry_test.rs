//! Integration tests for GateRegistry

use gatematch::engine::{GateRegistry, RegistryChangeset};
use gatematch::{
    BindingStatus, Gate, GateBinding, GateMatchError, GateOrigin, GpsPoint, PendingGateSuggestion,
};

fn gate(id: &str, name: &str) -> Gate {
    Gate {
        id: id.to_string(),
        host_event_id: "fest".to_string(),
        name: name.to_string(),
        position: Some(GpsPoint::new(47.3769, 8.5417)),
        radius_meters: Some(30.0),
        created_at: 100,
        origin: GateOrigin::Discovered,
    }
}

fn binding(gate_id: &str, category: &str, status: BindingStatus) -> GateBinding {
    GateBinding {
        gate_id: gate_id.to_string(),
        category: category.to_string(),
        status,
        confidence: 0.9,
        sample_count: 25,
        host_event_id: "fest".to_string(),
    }
}

#[test]
fn test_apply_creates_gates_and_bindings() {
    let mut registry = GateRegistry::new("fest");

    let changeset = RegistryChangeset {
        new_gates: vec![gate("gate-1", "VIP Gate")],
        binding_upserts: vec![binding("gate-1", "VIP", BindingStatus::Enforced)],
        ..RegistryChangeset::default()
    };
    registry.apply(changeset).unwrap();

    assert_eq!(registry.live_gate_count(), 1);
    assert_eq!(registry.bindings_for("gate-1").len(), 1);

    let resolution = registry.resolve_binding("gate-1", "VIP").unwrap();
    assert_eq!(resolution.status, BindingStatus::Enforced);
    assert!(resolution.may_deny());
}

#[test]
fn test_resolve_binding_missing_category_is_unbound() {
    let mut registry = GateRegistry::new("fest");
    registry
        .apply(RegistryChangeset {
            new_gates: vec![gate("gate-1", "VIP Gate")],
            ..RegistryChangeset::default()
        })
        .unwrap();

    // No binding for the category: absence of evidence is not a fault
    let resolution = registry.resolve_binding("gate-1", "Press").unwrap();
    assert_eq!(resolution.status, BindingStatus::Unbound);
    assert_eq!(resolution.confidence, 0.0);
    assert!(!resolution.may_deny());
}

#[test]
fn test_resolve_binding_unknown_gate_errors() {
    let registry = GateRegistry::new("fest");
    let err = registry.resolve_binding("gate-404", "VIP").unwrap_err();
    assert!(matches!(err, GateMatchError::UnknownGate { .. }));
}

#[test]
fn test_retirement_remap_keeps_ids_resolvable() {
    let mut registry = GateRegistry::new("fest");
    registry
        .apply(RegistryChangeset {
            new_gates: vec![gate("gate-1", "VIP Gate"), gate("gate-2", "VIP Entrance")],
            ..RegistryChangeset::default()
        })
        .unwrap();

    registry
        .apply(RegistryChangeset {
            retirements: vec![("gate-1".to_string(), "gate-2".to_string())],
            binding_upserts: vec![binding("gate-2", "VIP", BindingStatus::Enforced)],
            ..RegistryChangeset::default()
        })
        .unwrap();

    assert_eq!(registry.live_gate_count(), 1);
    assert!(registry.gate("gate-1").is_none());

    // Historical references to the retired id follow the remap
    let resolved = registry.resolve_gate("gate-1").unwrap();
    assert_eq!(resolved.id, "gate-2");
    let resolution = registry.resolve_binding("gate-1", "VIP").unwrap();
    assert_eq!(resolution.status, BindingStatus::Enforced);
}

#[test]
fn test_remap_chains_across_merge_generations() {
    let mut registry = GateRegistry::new("fest");
    registry
        .apply(RegistryChangeset {
            new_gates: vec![
                gate("gate-1", "VIP Gate"),
                gate("gate-2", "VIP Entrance"),
                gate("gate-3", "VIP Area"),
            ],
            ..RegistryChangeset::default()
        })
        .unwrap();

    registry
        .apply(RegistryChangeset {
            retirements: vec![("gate-1".to_string(), "gate-2".to_string())],
            ..RegistryChangeset::default()
        })
        .unwrap();
    registry
        .apply(RegistryChangeset {
            retirements: vec![("gate-2".to_string(), "gate-3".to_string())],
            ..RegistryChangeset::default()
        })
        .unwrap();

    assert_eq!(registry.resolve_gate("gate-1").unwrap().id, "gate-3");
}

#[test]
fn test_invalid_changeset_rolls_back_everything() {
    let mut registry = GateRegistry::new("fest");
    registry
        .apply(RegistryChangeset {
            new_gates: vec![gate("gate-1", "VIP Gate")],
            binding_upserts: vec![binding("gate-1", "VIP", BindingStatus::Enforced)],
            ..RegistryChangeset::default()
        })
        .unwrap();

    // Valid new gate plus a binding against a nonexistent gate: the whole
    // changeset must be rejected, leaving enforced state untouched
    let bad = RegistryChangeset {
        new_gates: vec![gate("gate-2", "Staff Gate")],
        binding_upserts: vec![binding("gate-404", "Staff", BindingStatus::Probation)],
        ..RegistryChangeset::default()
    };
    let err = registry.apply(bad).unwrap_err();
    assert!(matches!(err, GateMatchError::InvalidChangeset { .. }));

    assert_eq!(registry.live_gate_count(), 1);
    assert!(registry.gate("gate-2").is_none());
    let resolution = registry.resolve_binding("gate-1", "VIP").unwrap();
    assert_eq!(resolution.status, BindingStatus::Enforced);
}

#[test]
fn test_duplicate_gate_id_rejected() {
    let mut registry = GateRegistry::new("fest");
    registry
        .apply(RegistryChangeset {
            new_gates: vec![gate("gate-1", "VIP Gate")],
            ..RegistryChangeset::default()
        })
        .unwrap();

    let err = registry
        .apply(RegistryChangeset {
            new_gates: vec![gate("gate-1", "Another")],
            ..RegistryChangeset::default()
        })
        .unwrap_err();
    assert!(matches!(err, GateMatchError::InvalidChangeset { .. }));
}

#[test]
fn test_binding_against_retiring_gate_rejected() {
    let mut registry = GateRegistry::new("fest");
    registry
        .apply(RegistryChangeset {
            new_gates: vec![gate("gate-1", "VIP Gate"), gate("gate-2", "VIP Entrance")],
            ..RegistryChangeset::default()
        })
        .unwrap();

    let err = registry
        .apply(RegistryChangeset {
            retirements: vec![("gate-1".to_string(), "gate-2".to_string())],
            binding_upserts: vec![binding("gate-1", "VIP", BindingStatus::Enforced)],
            ..RegistryChangeset::default()
        })
        .unwrap_err();
    assert!(matches!(err, GateMatchError::InvalidChangeset { .. }));
}

#[test]
fn test_manual_gate_and_sequence() {
    let mut registry = GateRegistry::new("fest");
    let id = registry.insert_manual_gate("Side Door", None, None, 1_700_000_000);

    assert_eq!(registry.live_gate_count(), 1);
    let gate = registry.gate(&id).unwrap();
    assert_eq!(gate.origin, GateOrigin::Manual);
    assert!(gate.position.is_none());
}

#[test]
fn test_sequence_advances_past_applied_ids() {
    let mut registry = GateRegistry::new("fest");
    registry
        .apply(RegistryChangeset {
            new_gates: vec![gate("gate-7", "VIP Gate")],
            ..RegistryChangeset::default()
        })
        .unwrap();

    assert!(registry.peek_next_seq() >= 8);
    let manual_id = registry.insert_manual_gate("Side Door", None, None, 0);
    assert_ne!(manual_id, "gate-7");
}

#[test]
fn test_suggestion_approval() {
    let mut registry = GateRegistry::new("fest");
    registry
        .apply(RegistryChangeset {
            suggestions: vec![PendingGateSuggestion {
                name: "East Gate".to_string(),
                position: Some(GpsPoint::new(47.3769, 8.5417)),
                category_counts: vec![],
                reason: "gate cap of 1 reached".to_string(),
            }],
            ..RegistryChangeset::default()
        })
        .unwrap();

    assert_eq!(registry.pending_suggestions().len(), 1);

    // Approval honors the cap
    registry.insert_manual_gate("Existing", None, None, 0);
    let err = registry.approve_suggestion(0, 1, 0).unwrap_err();
    assert!(matches!(err, GateMatchError::GateCapReached { .. }));
    assert_eq!(registry.pending_suggestions().len(), 1);

    // With room, the suggestion becomes a gate
    let id = registry.approve_suggestion(0, 5, 0).unwrap();
    assert!(registry.gate(&id).is_some());
    assert!(registry.pending_suggestions().is_empty());

    let err = registry.approve_suggestion(3, 5, 0).unwrap_err();
    assert!(matches!(err, GateMatchError::SuggestionNotFound { .. }));
}
