//! Gate deduplication.
//!
//! GPS drift and inconsistent naming make the same physical entry point
//! reappear as several gate records. This module canonicalizes gate names,
//! groups duplicate candidates (matching canonical name AND nearby
//! centroid) into [`GateCluster`]s via Union-Find, and plans merges whose
//! binding confidences are recomputed from the combined raw counts - never
//! averaged from the originals, which would misrepresent the combined
//! sample's statistical strength.

use std::collections::HashMap;

use crate::confidence::wilson_lower_bound;
use crate::geo_utils::haversine_distance;
use crate::union_find::UnionFind;
use crate::{
    BindingStatus, DedupConfig, DiscoveryConfig, Gate, GateBinding, GateCluster, binding,
};

/// A planned merge for one duplicate cluster: retire the duplicates, rewrite
/// their bindings onto the primary with summed counts and recomputed
/// confidence.
#[derive(Debug, Clone)]
pub struct MergePlan {
    pub primary_id: String,
    pub retired_ids: Vec<String>,
    pub bindings: Vec<GateBinding>,
}

/// Canonicalize a gate name to a category key.
///
/// Lower-cases, drops punctuation inside words ("V.I.P" becomes "vip"),
/// strips generic and non-alphabetic tokens, then maps the remainder
/// through the synonym table. Names with no recognizable token
/// canonicalize to "general".
pub fn canonical_name(name: &str, config: &DedupConfig) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else if c == '.' || c == '\'' {
                '\u{0}' // removed below; keeps "v.i.p" as one token
            } else {
                ' '
            }
        })
        .filter(|c| *c != '\u{0}')
        .collect();

    let remainder: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|token| {
            token.chars().all(|c| c.is_alphabetic())
                && !config.generic_tokens.iter().any(|g| g == token)
        })
        .collect();

    if remainder.is_empty() {
        return "general".to_string();
    }

    let key = remainder.join(" ");
    config.synonyms.get(&key).cloned().unwrap_or(key)
}

/// Whether two gates are duplicate candidates: canonical names must match
/// (checked by the caller's bucketing) and centroids must be within the
/// dedup radius. Two position-less gates pair on name alone; a positioned
/// and a position-less gate never pair.
fn within_dedup_distance(a: &Gate, b: &Gate, config: &DedupConfig) -> bool {
    match (&a.position, &b.position) {
        (Some(pa), Some(pb)) => haversine_distance(pa, pb) <= config.dedup_radius_meters,
        (None, None) => true,
        _ => false,
    }
}

/// Combined sample count across all of a gate's bindings.
fn combined_sample_count(gate_id: &str, bindings_by_gate: &HashMap<String, Vec<GateBinding>>) -> u32 {
    bindings_by_gate
        .get(gate_id)
        .map(|bindings| bindings.iter().map(|b| b.sample_count).sum())
        .unwrap_or(0)
}

/// Scan the gate set for duplicate clusters.
///
/// Gates are bucketed by canonical name; within a bucket, pairs within the
/// dedup radius are unioned and each resulting component of two or more
/// gates becomes a [`GateCluster`]. The primary is the gate with the
/// highest combined sample count, ties broken by earliest `created_at`,
/// then id. Re-running with no new data produces zero additional clusters
/// because merged duplicates are already retired.
pub fn find_duplicate_clusters(
    gates: &[Gate],
    bindings_by_gate: &HashMap<String, Vec<GateBinding>>,
    config: &DedupConfig,
) -> Vec<GateCluster> {
    let mut buckets: HashMap<String, Vec<&Gate>> = HashMap::new();
    for gate in gates {
        buckets
            .entry(canonical_name(&gate.name, config))
            .or_default()
            .push(gate);
    }

    let mut bucket_list: Vec<(String, Vec<&Gate>)> = buckets.into_iter().collect();
    bucket_list.sort_by(|a, b| a.0.cmp(&b.0));

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        bucket_list
            .par_iter()
            .flat_map(|(_, bucket)| cluster_bucket(bucket, bindings_by_gate, config))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        bucket_list
            .iter()
            .flat_map(|(_, bucket)| cluster_bucket(bucket, bindings_by_gate, config))
            .collect()
    }
}

/// Build gate clusters from one canonical-name bucket.
fn cluster_bucket(
    bucket: &[&Gate],
    bindings_by_gate: &HashMap<String, Vec<GateBinding>>,
    config: &DedupConfig,
) -> Vec<GateCluster> {
    if bucket.len() < 2 {
        return Vec::new();
    }

    let mut uf: UnionFind<String> = UnionFind::with_capacity(bucket.len());
    for gate in bucket {
        uf.make_set(gate.id.clone());
    }

    for (i, a) in bucket.iter().enumerate() {
        for b in bucket.iter().skip(i + 1) {
            if within_dedup_distance(a, b, config) {
                uf.union(&a.id, &b.id);
            }
        }
    }

    let by_id: HashMap<&str, &Gate> = bucket.iter().map(|g| (g.id.as_str(), *g)).collect();

    let mut clusters: Vec<GateCluster> = uf
        .groups()
        .into_values()
        .filter(|members| members.len() >= 2)
        .map(|members| build_gate_cluster(&members, &by_id, bindings_by_gate))
        .collect();

    clusters.sort_by(|a, b| a.primary.id.cmp(&b.primary.id));
    clusters
}

/// Assemble a [`GateCluster`] from component member ids.
fn build_gate_cluster(
    member_ids: &[String],
    by_id: &HashMap<&str, &Gate>,
    bindings_by_gate: &HashMap<String, Vec<GateBinding>>,
) -> GateCluster {
    let mut members: Vec<&Gate> = member_ids
        .iter()
        .filter_map(|id| by_id.get(id.as_str()).copied())
        .collect();

    // Primary: highest combined sample count, then earliest creation, then id
    members.sort_by(|a, b| {
        combined_sample_count(&b.id, bindings_by_gate)
            .cmp(&combined_sample_count(&a.id, bindings_by_gate))
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    let primary = members[0].clone();
    let duplicates: Vec<Gate> = members[1..].iter().map(|g| (*g).clone()).collect();

    let positions: Vec<crate::GpsPoint> = members.iter().filter_map(|g| g.position).collect();
    let average_location = (!positions.is_empty()).then(|| crate::geo_utils::compute_center(&positions));

    let total_sample_count = members
        .iter()
        .map(|g| combined_sample_count(&g.id, bindings_by_gate))
        .sum();

    let highest_confidence = members
        .iter()
        .filter_map(|g| bindings_by_gate.get(&g.id))
        .flatten()
        .map(|b| b.confidence)
        .fold(0.0, f64::max);

    GateCluster {
        primary,
        duplicates,
        average_location,
        total_sample_count,
        highest_confidence,
    }
}

/// Plan the merge for one duplicate cluster.
///
/// For each category present in any member's bindings, the merged binding
/// carries the summed sample count, and confidence is recomputed from the
/// combined counts (k over the merged gate's total n). Status is resolved
/// through the usual recompute, with the primary's existing status feeding
/// the hysteresis band.
pub fn plan_merge(
    cluster: &GateCluster,
    bindings_by_gate: &HashMap<String, Vec<GateBinding>>,
    config: &DiscoveryConfig,
) -> MergePlan {
    let mut combined: HashMap<String, u32> = HashMap::new();
    let member_ids =
        std::iter::once(&cluster.primary.id).chain(cluster.duplicates.iter().map(|g| &g.id));
    for gate_id in member_ids {
        if let Some(bindings) = bindings_by_gate.get(gate_id) {
            for b in bindings {
                *combined.entry(b.category.clone()).or_insert(0) += b.sample_count;
            }
        }
    }

    let total: u32 = combined.values().sum();

    let previous_status = |category: &str| -> Option<BindingStatus> {
        bindings_by_gate
            .get(&cluster.primary.id)?
            .iter()
            .find(|b| b.category == category)
            .map(|b| b.status)
    };

    let mut bindings: Vec<GateBinding> = combined
        .into_iter()
        .map(|(category, count)| {
            let confidence = if (total as usize) < config.min_points {
                0.0
            } else {
                wilson_lower_bound(count, total, config.confidence_z)
            };
            let status =
                binding::resolve_status(count, confidence, previous_status(&category), config);
            GateBinding {
                gate_id: cluster.primary.id.clone(),
                category,
                status,
                confidence,
                sample_count: count,
                host_event_id: cluster.primary.host_event_id.clone(),
            }
        })
        .collect();

    bindings.sort_by(|a, b| a.category.cmp(&b.category));

    MergePlan {
        primary_id: cluster.primary.id.clone(),
        retired_ids: cluster.duplicates.iter().map(|g| g.id.clone()).collect(),
        bindings,
    }
}

/// Global duplicate-prevention check run before any gate creation.
///
/// Tests a would-be gate's canonical name and position against the entire
/// live gate set; a match means the new data should be absorbed into the
/// returned gate instead of creating a duplicate. Among several positioned
/// matches the nearest wins.
pub fn find_absorbing_gate<'a>(
    name: &str,
    position: Option<&crate::GpsPoint>,
    gates: impl IntoIterator<Item = &'a Gate>,
    config: &DedupConfig,
) -> Option<&'a Gate> {
    let key = canonical_name(name, config);
    let named_matches = gates
        .into_iter()
        .filter(|gate| canonical_name(&gate.name, config) == key);

    match position {
        Some(p) => named_matches
            .filter_map(|gate| {
                let gate_position = gate.position.as_ref()?;
                let distance = haversine_distance(p, gate_position);
                (distance <= config.dedup_radius_meters).then_some((gate, distance))
            })
            .min_by(|(_, da), (_, db)| da.partial_cmp(db).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(gate, _)| gate),
        None => {
            let mut matches: Vec<&Gate> =
                named_matches.filter(|gate| gate.position.is_none()).collect();
            matches.sort_by(|a, b| a.id.cmp(&b.id));
            matches.into_iter().next()
        }
    }
}
