//! Tests for virtual gate synthesis

use gatematch::geo_utils::{haversine_distance, offset_by_meters};
use gatematch::synthesis::category_from_descriptor;
use gatematch::{
    CheckInEvent, DiscoveryConfig, GpsPoint, LocationCluster, synthesize_virtual_gates,
};

const CENTROID: GpsPoint = GpsPoint {
    latitude: 47.3769,
    longitude: 8.5417,
};

fn members(counts: &[(&str, usize)]) -> Vec<CheckInEvent> {
    let mut events = Vec::new();
    for (category, count) in counts {
        for i in 0..*count {
            let p = offset_by_meters(&CENTROID, (i % 9) as f64, (i % 7) as f64);
            events.push(CheckInEvent::located(
                format!("{category}-{i}"),
                format!("wb-{category}-{i}"),
                *category,
                1_700_000_000 + i as i64,
                p.latitude,
                p.longitude,
            ));
        }
    }
    events
}

fn single_location_cluster(counts: &[(&str, usize)]) -> LocationCluster {
    LocationCluster {
        centroid: CENTROID,
        members: members(counts),
        is_single_location: true,
    }
}

#[test]
fn test_partition_example() {
    // 100 VIP / 150 Staff / 200 General / 16 Press at creation threshold 20
    // yields exactly three virtual gates; Press stays unassigned
    let cluster =
        single_location_cluster(&[("VIP", 100), ("Staff", 150), ("General", 200), ("Press", 16)]);

    let mut config = DiscoveryConfig::default();
    config.min_points = 20;

    let outcome = synthesize_virtual_gates(&cluster, &config);

    assert_eq!(outcome.gates.len(), 3);
    let mut categories: Vec<&str> =
        outcome.gates.iter().map(|g| g.category.as_str()).collect();
    categories.sort();
    assert_eq!(categories, vec!["General", "Staff", "VIP"]);

    assert_eq!(outcome.unassigned.len(), 1);
    assert_eq!(outcome.unassigned[0].category, "Press");
    assert_eq!(outcome.unassigned[0].count, 16);
}

#[test]
fn test_gate_names_follow_category() {
    let cluster = single_location_cluster(&[("VIP", 30)]);
    let outcome = synthesize_virtual_gates(&cluster, &DiscoveryConfig::default());

    assert_eq!(outcome.gates.len(), 1);
    assert_eq!(outcome.gates[0].name, "VIP Virtual Gate");
    assert_eq!(outcome.gates[0].sample_count, 30);
}

#[test]
fn test_offsets_are_small_and_distinct() {
    let cluster = single_location_cluster(&[("VIP", 30), ("Staff", 30), ("General", 30)]);
    let outcome = synthesize_virtual_gates(&cluster, &DiscoveryConfig::default());

    assert_eq!(outcome.gates.len(), 3);
    for gate in &outcome.gates {
        let offset = haversine_distance(&cluster.centroid, &gate.position);
        // Co-located but geographically distinguishable
        assert!(offset > 0.1 && offset < 3.0, "offset was {offset} m");
    }

    for (i, a) in outcome.gates.iter().enumerate() {
        for b in outcome.gates.iter().skip(i + 1) {
            assert!(haversine_distance(&a.position, &b.position) > 0.1);
        }
    }
}

#[test]
fn test_offsets_are_deterministic() {
    let cluster = single_location_cluster(&[("VIP", 30), ("Staff", 40)]);
    let first = synthesize_virtual_gates(&cluster, &DiscoveryConfig::default());
    let second = synthesize_virtual_gates(&cluster, &DiscoveryConfig::default());

    assert_eq!(first.gates, second.gates);
}

#[test]
fn test_all_categories_below_threshold() {
    let cluster = single_location_cluster(&[("VIP", 3), ("Staff", 4)]);
    let outcome = synthesize_virtual_gates(&cluster, &DiscoveryConfig::default());

    assert!(outcome.gates.is_empty());
    // Nothing is silently dropped
    assert_eq!(outcome.unassigned.len(), 2);
}

#[test]
fn test_manual_events_partition_by_descriptor() {
    let mut cluster = single_location_cluster(&[("VIP", 20)]);
    for i in 0..15 {
        cluster.members.push(CheckInEvent::manual(
            format!("m-{i}"),
            format!("wb-m-{i}"),
            "",
            1_700_000_000 + i,
            "Manual Check-in - Staff Area",
        ));
    }

    let outcome = synthesize_virtual_gates(&cluster, &DiscoveryConfig::default());

    let mut categories: Vec<&str> =
        outcome.gates.iter().map(|g| g.category.as_str()).collect();
    categories.sort();
    assert_eq!(categories, vec!["Staff", "VIP"]);
}

#[test]
fn test_category_from_descriptor() {
    assert_eq!(
        category_from_descriptor("Manual Check-in - VIP Area"),
        Some("VIP".to_string())
    );
    assert_eq!(
        category_from_descriptor("Manual Check-in - Press Gate"),
        Some("Press".to_string())
    );
    assert_eq!(category_from_descriptor("Staff Entrance"), Some("Staff".to_string()));
    assert_eq!(category_from_descriptor("Manual Check-in"), None);
    assert_eq!(category_from_descriptor(""), None);
    assert_eq!(category_from_descriptor("Area"), None);
}
