//! Binding confidence estimation using the Wilson score interval.
//!
//! The lower bound of the Wilson interval - rather than the raw proportion -
//! is what keeps small, noisy samples from looking artificially confident:
//! it shrinks toward 0 as n shrinks and widens the uncertainty band.

use std::collections::HashMap;

use crate::{CheckInEvent, DiscoveryConfig};

/// Per-category evidence extracted from a cluster: sample count and
/// lower-bound confidence that the category belongs to the location.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryEvidence {
    pub category: String,
    pub sample_count: u32,
    pub confidence: f64,
}

/// Lower bound of the Wilson score interval for `successes` out of `trials`
/// at z-score `z`.
///
/// Returns 0.0 for zero trials and exactly 1.0 for a pure sample
/// (`successes == trials`), avoiding numerical artifacts from the general
/// formula at small n. The result is clamped to [0, 1].
pub fn wilson_lower_bound(successes: u32, trials: u32, z: f64) -> f64 {
    if trials == 0 {
        return 0.0;
    }
    if successes >= trials {
        return 1.0;
    }

    let n = trials as f64;
    let p = successes as f64 / n;
    let z2 = z * z;

    let denominator = 1.0 + z2 / n;
    let center = p + z2 / (2.0 * n);
    let margin = z * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt();

    ((center - margin) / denominator).clamp(0.0, 1.0)
}

/// Estimate per-category evidence for one cluster's member events.
///
/// Members are grouped by [`CheckInEvent::effective_category`], so the sum
/// of the returned sample counts always equals the cluster size. Confidence
/// is the Wilson lower bound of k/n over the cluster total n, or 0.0 when
/// the cluster is below `min_points` (insufficient evidence for any
/// binding to leave `Unbound`).
///
/// The result is sorted by descending count, then category name, so output
/// is deterministic.
pub fn estimate_categories(
    members: &[CheckInEvent],
    config: &DiscoveryConfig,
) -> Vec<CategoryEvidence> {
    let n = members.len();

    let mut counts: HashMap<String, u32> = HashMap::new();
    for event in members {
        *counts.entry(event.effective_category()).or_insert(0) += 1;
    }

    let mut evidence: Vec<CategoryEvidence> = counts
        .into_iter()
        .map(|(category, count)| {
            let confidence = if n < config.min_points {
                0.0
            } else {
                wilson_lower_bound(count, n as u32, config.confidence_z)
            };
            CategoryEvidence {
                category,
                sample_count: count,
                confidence,
            }
        })
        .collect();

    evidence.sort_by(|a, b| {
        b.sample_count
            .cmp(&a.sample_count)
            .then_with(|| a.category.cmp(&b.category))
    });

    evidence
}
