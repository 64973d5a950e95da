//! Tests for the Wilson lower-bound confidence estimator

use gatematch::{CheckInEvent, DiscoveryConfig, estimate_categories, wilson_lower_bound};

const Z: f64 = 1.96;

fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

#[test]
fn test_wilson_in_unit_interval() {
    for n in [1u32, 2, 5, 10, 50, 100, 1000] {
        for k in 0..=n {
            let conf = wilson_lower_bound(k, n, Z);
            assert!(
                (0.0..=1.0).contains(&conf),
                "wilson({k}, {n}) = {conf} out of range"
            );
        }
    }
}

#[test]
fn test_wilson_zero_trials() {
    assert_eq!(wilson_lower_bound(0, 0, Z), 0.0);
}

#[test]
fn test_wilson_pure_sample_is_exactly_one() {
    // k == n short-circuits to exactly 1.0, avoiding numerical artifacts
    // from the general formula at small n
    for n in [1u32, 5, 10, 25, 466] {
        assert_eq!(wilson_lower_bound(n, n, Z), 1.0);
    }
}

#[test]
fn test_wilson_monotonic_in_successes() {
    let n = 100;
    let mut previous = -1.0;
    for k in 0..=n {
        let conf = wilson_lower_bound(k, n, Z);
        assert!(
            conf >= previous,
            "wilson({k}, {n}) = {conf} decreased from {previous}"
        );
        previous = conf;
    }
}

#[test]
fn test_wilson_approaches_proportion_as_n_grows() {
    // For fixed p = 0.5, the lower bound rises toward p as the sample grows
    let small = wilson_lower_bound(5, 10, Z);
    let medium = wilson_lower_bound(50, 100, Z);
    let large = wilson_lower_bound(5000, 10_000, Z);

    assert!(small < medium);
    assert!(medium < large);
    assert!(large < 0.5);
    assert!(approx_eq(large, 0.5, 0.01));
}

#[test]
fn test_wilson_shrinks_small_noisy_samples() {
    // 7 of 10 looks like 70%, but the lower bound is far more cautious
    let conf = wilson_lower_bound(7, 10, Z);
    assert!(conf < 0.45);
    assert!(conf > 0.3);
}

#[test]
fn test_wilson_known_value() {
    // k=90, n=100: standard Wilson lower bound is ~0.825
    let conf = wilson_lower_bound(90, 100, Z);
    assert!(approx_eq(conf, 0.825, 0.005));
}

fn cluster_members(counts: &[(&str, usize)]) -> Vec<CheckInEvent> {
    let mut events = Vec::new();
    for (category, count) in counts {
        for i in 0..*count {
            events.push(CheckInEvent::located(
                format!("{category}-{i}"),
                format!("wb-{category}-{i}"),
                *category,
                1_700_000_000 + i as i64,
                47.3769,
                8.5417,
            ));
        }
    }
    events
}

#[test]
fn test_estimate_counts_conserved() {
    let members = cluster_members(&[("VIP", 30), ("Staff", 20), ("General", 50)]);
    let evidence = estimate_categories(&members, &DiscoveryConfig::default());

    let total: u32 = evidence.iter().map(|e| e.sample_count).sum();
    assert_eq!(total as usize, members.len());
    assert_eq!(evidence.len(), 3);
}

#[test]
fn test_estimate_below_min_points_is_zero_confidence() {
    let members = cluster_members(&[("VIP", 4)]);
    let config = DiscoveryConfig::default(); // min_points = 10

    let evidence = estimate_categories(&members, &config);
    assert_eq!(evidence.len(), 1);
    assert_eq!(evidence[0].sample_count, 4);
    assert_eq!(evidence[0].confidence, 0.0);
}

#[test]
fn test_estimate_pure_cluster() {
    let members = cluster_members(&[("VIP", 25)]);
    let evidence = estimate_categories(&members, &DiscoveryConfig::default());

    assert_eq!(evidence[0].category, "VIP");
    assert_eq!(evidence[0].confidence, 1.0);
}

#[test]
fn test_estimate_sorted_by_count() {
    let members = cluster_members(&[("VIP", 10), ("General", 40), ("Staff", 20)]);
    let evidence = estimate_categories(&members, &DiscoveryConfig::default());

    assert_eq!(evidence[0].category, "General");
    assert_eq!(evidence[1].category, "Staff");
    assert_eq!(evidence[2].category, "VIP");
}

#[test]
fn test_estimate_empty_cluster() {
    let evidence = estimate_categories(&[], &DiscoveryConfig::default());
    assert!(evidence.is_empty());
}
