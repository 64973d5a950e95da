//! Virtual gate synthesis for single-location venues.
//!
//! When a venue has only one physical location, one generic multi-category
//! gate would score each category near its share of the mix (e.g. 35%) and
//! stay stuck in `Probation` forever. Instead, each qualifying category gets
//! its own synthetic, category-pure gate: confidence 1.0 holds by
//! construction, and the gates are offset ~1 m from the shared centroid so
//! they stay geographically distinguishable while co-located.

use std::collections::HashMap;
use std::f64::consts::TAU;

use log::info;

use crate::geo_utils::offset_by_meters;
use crate::{CategoryCount, DiscoveryConfig, GpsPoint, LocationCluster};

/// A synthetic gate the engine should materialize: one per qualifying
/// category of a single-location cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualGateSpec {
    pub category: String,
    /// Gate name, e.g. "VIP Virtual Gate".
    pub name: String,
    /// Base centroid offset by a small per-category delta.
    pub position: GpsPoint,
    pub sample_count: u32,
}

/// Output of virtual gate synthesis.
#[derive(Debug, Clone, Default)]
pub struct SynthesisOutcome {
    pub gates: Vec<VirtualGateSpec>,
    /// Categories below the creation threshold: unassigned pending more
    /// data, never silently dropped.
    pub unassigned: Vec<CategoryCount>,
}

/// Synthesize per-category virtual gates for a single-location cluster.
///
/// Events are partitioned by [`crate::CheckInEvent::effective_category`]
/// (descriptor parsing covers manual entries). Every category with at least
/// `min_points` events yields a spec; the rest are reported as unassigned.
/// Offsets are deterministic: categories are ordered by descending count
/// and placed on evenly spaced compass bearings.
pub fn synthesize_virtual_gates(
    cluster: &LocationCluster,
    config: &DiscoveryConfig,
) -> SynthesisOutcome {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for event in &cluster.members {
        *counts.entry(event.effective_category()).or_insert(0) += 1;
    }

    let mut ordered: Vec<(String, u32)> = counts.into_iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let qualifying: Vec<&(String, u32)> = ordered
        .iter()
        .filter(|(_, count)| *count as usize >= config.min_points)
        .collect();

    let mut outcome = SynthesisOutcome::default();

    for (slot, (category, count)) in qualifying.iter().enumerate() {
        let bearing = TAU * slot as f64 / qualifying.len() as f64;
        let east = config.virtual_gate_offset_meters * bearing.sin();
        let north = config.virtual_gate_offset_meters * bearing.cos();

        outcome.gates.push(VirtualGateSpec {
            category: category.clone(),
            name: format!("{category} Virtual Gate"),
            position: offset_by_meters(&cluster.centroid, east, north),
            sample_count: *count,
        });
    }

    for (category, count) in &ordered {
        if (*count as usize) < config.min_points {
            outcome.unassigned.push(CategoryCount {
                category: category.clone(),
                count: *count,
            });
        }
    }

    if !outcome.gates.is_empty() {
        info!(
            "synthesized {} virtual gates ({} categories unassigned)",
            outcome.gates.len(),
            outcome.unassigned.len()
        );
    }

    outcome
}

/// Parse a wristband category out of a free-text location descriptor.
///
/// Manual check-ins carry text like "Manual Check-in - VIP Area"; the
/// category is the last dash-separated segment with trailing generic
/// location words removed.
pub fn category_from_descriptor(descriptor: &str) -> Option<String> {
    let segment = descriptor.rsplit(['-', ':']).next()?.trim();
    if segment.is_empty() {
        return None;
    }

    let words: Vec<&str> = segment
        .split_whitespace()
        .filter(|word| {
            !matches!(
                word.to_lowercase().as_str(),
                "area" | "gate" | "entrance" | "zone" | "lounge" | "section"
            )
        })
        .collect();

    if words.is_empty() {
        return None;
    }

    let candidate = words.join(" ");
    // "Manual Check-in" style descriptors have no category segment
    let lowered = candidate.to_lowercase();
    if lowered == "manual" || lowered == "check" || lowered == "in" || lowered == "checkin" {
        return None;
    }

    Some(candidate)
}
