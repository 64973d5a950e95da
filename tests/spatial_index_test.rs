//! Integration tests for GateSpatialIndex

use gatematch::engine::{GateRegistry, GateSpatialIndex, RegistryChangeset};
use gatematch::geo_utils::offset_by_meters;
use gatematch::{Gate, GateOrigin, GpsPoint};

const ORIGIN: GpsPoint = GpsPoint {
    latitude: 47.3769,
    longitude: 8.5417,
};

fn setup_registry() -> GateRegistry {
    let mut registry = GateRegistry::new("fest");
    let north = Gate {
        id: "gate-1".to_string(),
        host_event_id: "fest".to_string(),
        name: "North Gate".to_string(),
        position: Some(ORIGIN),
        radius_meters: Some(30.0),
        created_at: 100,
        origin: GateOrigin::Discovered,
    };
    let south = Gate {
        id: "gate-2".to_string(),
        host_event_id: "fest".to_string(),
        name: "South Gate".to_string(),
        position: Some(offset_by_meters(&ORIGIN, 0.0, -500.0)),
        radius_meters: Some(30.0),
        created_at: 200,
        origin: GateOrigin::Discovered,
    };
    let descriptor_only = Gate {
        id: "gate-3".to_string(),
        host_event_id: "fest".to_string(),
        name: "Backstage Door".to_string(),
        position: None,
        radius_meters: None,
        created_at: 300,
        origin: GateOrigin::Discovered,
    };

    registry
        .apply(RegistryChangeset {
            new_gates: vec![north, south, descriptor_only],
            ..RegistryChangeset::default()
        })
        .unwrap();
    registry
}

#[test]
fn test_build_indexes_only_positioned_gates() {
    let registry = setup_registry();
    let mut index = GateSpatialIndex::new();

    index.mark_dirty();
    index.ensure_built(&registry);

    assert_eq!(index.len(), 2);
    assert!(!index.is_dirty());
}

#[test]
fn test_find_within_radius() {
    let registry = setup_registry();
    let mut index = GateSpatialIndex::new();
    index.rebuild(&registry);

    let near_north = offset_by_meters(&ORIGIN, 10.0, 0.0);
    assert_eq!(index.find_within(&near_north, 50.0), vec!["gate-1".to_string()]);

    let between = offset_by_meters(&ORIGIN, 0.0, -250.0);
    assert!(index.find_within(&between, 100.0).is_empty());

    let mut both = index.find_within(&between, 300.0);
    both.sort();
    assert_eq!(both, vec!["gate-1".to_string(), "gate-2".to_string()]);
}

#[test]
fn test_dirty_tracking() {
    let registry = setup_registry();
    let mut index = GateSpatialIndex::new();

    assert!(!index.is_dirty());

    index.mark_dirty();
    assert!(index.is_dirty());

    index.ensure_built(&registry);
    assert!(!index.is_dirty());
}

#[test]
fn test_clear() {
    let registry = setup_registry();
    let mut index = GateSpatialIndex::new();
    index.rebuild(&registry);

    assert_eq!(index.len(), 2);

    index.clear();

    assert!(index.is_empty());
    assert!(!index.is_dirty());
}
