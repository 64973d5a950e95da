//! Spatial clustering of check-in events.
//!
//! Groups coordinate-bearing check-ins into density-based location clusters
//! using great-circle distance, with an R-tree for neighborhood queries.
//! Detects the degenerate "single physical location" venue before forming
//! fine-grained clusters, and routes coordinate-less events into non-spatial
//! pseudo-clusters keyed by their location descriptor.

use std::collections::BTreeMap;

use log::{debug, info};
use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::geo_utils::{
    compute_center, haversine_distance, meters_to_degrees, meters_to_degrees_lat,
};
use crate::{CheckInEvent, DescriptorCluster, DiscoveryConfig, GpsPoint, LocationCluster};

/// Output of spatial clustering for one host event's check-ins.
#[derive(Debug, Clone, Default)]
pub struct ClusterOutcome {
    /// Density clusters of coordinate-bearing events.
    pub clusters: Vec<LocationCluster>,
    /// Pseudo-clusters of coordinate-less events, keyed by descriptor.
    pub descriptor_clusters: Vec<DescriptorCluster>,
    /// Events excluded from confidence computation (spatial outliers and
    /// events with neither coordinates nor descriptor). Retained in raw
    /// storage by the caller.
    pub outlier_ids: Vec<String>,
    /// True when single-location detection collapsed the venue to one cluster.
    pub is_single_location: bool,
}

/// A check-in position with its index for R-tree region queries.
#[derive(Debug, Clone, Copy)]
struct IndexedEvent {
    idx: usize,
    lat: f64,
    lng: f64,
}

impl RTreeObject for IndexedEvent {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

impl PointDistance for IndexedEvent {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.lat - point[0];
        let dlng = self.lng - point[1];
        dlat * dlat + dlng * dlng
    }
}

/// Cluster one host event's check-ins into location clusters.
///
/// Events with valid coordinates go through single-location detection and
/// then density clustering; events without go into descriptor
/// pseudo-clusters. Zero coordinate-bearing events produce zero spatial
/// clusters - never an error.
pub fn cluster_events(events: &[CheckInEvent], config: &DiscoveryConfig) -> ClusterOutcome {
    let mut outcome = ClusterOutcome::default();

    // Partition into located / descriptor-only
    let mut located: Vec<(usize, GpsPoint)> = Vec::new();
    let mut unlocated: Vec<usize> = Vec::new();
    for (idx, event) in events.iter().enumerate() {
        match event.position() {
            Some(point) => located.push((idx, point)),
            None => unlocated.push(idx),
        }
    }

    outcome.descriptor_clusters = group_by_descriptor(events, &unlocated, &mut outcome.outlier_ids);

    if located.is_empty() {
        debug!("no coordinate-bearing check-ins; all data routed through descriptor clusters");
        return outcome;
    }

    let tree = build_index(&located);

    // Single-location detection runs before multi-cluster formation.
    // The best anchor's neighborhood measures how much of the venue sits
    // "within the radius of each other"; stop scanning once an anchor
    // already clears the fraction.
    if located.len() >= config.min_points {
        let needed = (config.single_location_fraction * located.len() as f64).ceil() as usize;
        let mut best_neighborhood: Vec<usize> = Vec::new();
        for i in 0..located.len() {
            let neighborhood =
                region_query(&tree, &located, i, config.single_location_radius_meters);
            if neighborhood.len() > best_neighborhood.len() {
                best_neighborhood = neighborhood;
                if best_neighborhood.len() >= needed {
                    break;
                }
            }
        }

        let fraction = best_neighborhood.len() as f64 / located.len() as f64;
        if fraction >= config.single_location_fraction {
            info!(
                "single-location venue: {}/{} check-ins within {:.0} m ({:.1}%)",
                best_neighborhood.len(),
                located.len(),
                config.single_location_radius_meters,
                fraction * 100.0
            );

            let in_neighborhood: Vec<bool> = {
                let mut flags = vec![false; located.len()];
                for &i in &best_neighborhood {
                    flags[i] = true;
                }
                flags
            };

            let mut members = Vec::with_capacity(best_neighborhood.len());
            let mut member_positions = Vec::with_capacity(best_neighborhood.len());
            for (local_idx, (event_idx, position)) in located.iter().enumerate() {
                if in_neighborhood[local_idx] {
                    members.push(events[*event_idx].clone());
                    member_positions.push(*position);
                } else {
                    outcome.outlier_ids.push(events[*event_idx].id.clone());
                }
            }

            outcome.clusters.push(LocationCluster {
                centroid: compute_center(&member_positions),
                members,
                is_single_location: true,
            });
            outcome.is_single_location = true;
            return outcome;
        }
    }

    // Ordinary density clustering
    let (clusters, noise) = dbscan(&tree, &located, config);
    for member_indices in clusters {
        let members: Vec<CheckInEvent> =
            member_indices.iter().map(|&i| events[i].clone()).collect();
        let positions: Vec<GpsPoint> = members.iter().filter_map(|e| e.position()).collect();
        outcome.clusters.push(LocationCluster {
            centroid: compute_center(&positions),
            members,
            is_single_location: false,
        });
    }
    outcome
        .outlier_ids
        .extend(noise.into_iter().map(|i| events[i].id.clone()));

    debug!(
        "clustered {} located check-ins into {} clusters ({} outliers)",
        located.len(),
        outcome.clusters.len(),
        outcome.outlier_ids.len()
    );

    outcome
}

/// Group coordinate-less events into descriptor pseudo-clusters.
///
/// Events with neither coordinates nor a descriptor cannot be grouped at
/// all and are reported as outliers.
fn group_by_descriptor(
    events: &[CheckInEvent],
    unlocated: &[usize],
    outlier_ids: &mut Vec<String>,
) -> Vec<DescriptorCluster> {
    // BTreeMap keeps descriptor cluster order deterministic
    let mut by_descriptor: BTreeMap<String, (String, Vec<CheckInEvent>)> = BTreeMap::new();

    for &idx in unlocated {
        let event = &events[idx];
        match event.location_descriptor.as_deref().map(str::trim) {
            Some(descriptor) if !descriptor.is_empty() => {
                by_descriptor
                    .entry(descriptor.to_lowercase())
                    .or_insert_with(|| (descriptor.to_string(), Vec::new()))
                    .1
                    .push(event.clone());
            }
            _ => outlier_ids.push(event.id.clone()),
        }
    }

    by_descriptor
        .into_values()
        .map(|(descriptor, members)| DescriptorCluster {
            descriptor,
            members,
        })
        .collect()
}

/// Build an R-tree over the located events' positions.
fn build_index(located: &[(usize, GpsPoint)]) -> RTree<IndexedEvent> {
    RTree::bulk_load(
        located
            .iter()
            .enumerate()
            .map(|(local_idx, (_, p))| IndexedEvent {
                idx: local_idx,
                lat: p.latitude,
                lng: p.longitude,
            })
            .collect(),
    )
}

/// Density-based clustering over indexed positions.
///
/// Returns the clusters as event-index lists plus the noise indices. A
/// cluster is seeded by a core point with at least `min_points` neighbors
/// (itself included) within `epsilon_meters`; border points join the first
/// cluster that reaches them.
fn dbscan(
    tree: &RTree<IndexedEvent>,
    located: &[(usize, GpsPoint)],
    config: &DiscoveryConfig,
) -> (Vec<Vec<usize>>, Vec<usize>) {
    const UNVISITED: i64 = -2;
    const NOISE: i64 = -1;

    let mut labels = vec![UNVISITED; located.len()];
    let mut cluster_id: i64 = 0;

    for start in 0..located.len() {
        if labels[start] != UNVISITED {
            continue;
        }

        let neighbors = region_query(tree, located, start, config.epsilon_meters);
        if neighbors.len() < config.min_points {
            labels[start] = NOISE;
            continue;
        }

        // Seed a new cluster and expand it
        labels[start] = cluster_id;
        let mut queue = neighbors;
        let mut head = 0;
        while head < queue.len() {
            let current = queue[head];
            head += 1;

            if labels[current] == NOISE {
                labels[current] = cluster_id; // border point
            }
            if labels[current] != UNVISITED {
                continue;
            }
            labels[current] = cluster_id;

            let current_neighbors = region_query(tree, located, current, config.epsilon_meters);
            if current_neighbors.len() >= config.min_points {
                queue.extend(current_neighbors);
            }
        }

        cluster_id += 1;
    }

    let mut clusters = vec![Vec::new(); cluster_id as usize];
    let mut noise = Vec::new();
    for (local_idx, label) in labels.iter().enumerate() {
        let event_idx = located[local_idx].0;
        match *label {
            NOISE => noise.push(event_idx),
            id => clusters[id as usize].push(event_idx),
        }
    }

    (clusters, noise)
}

/// All local indices within `radius_meters` of the given point, itself
/// included. Envelope query first, exact Haversine filter second.
fn region_query(
    tree: &RTree<IndexedEvent>,
    located: &[(usize, GpsPoint)],
    local_idx: usize,
    radius_meters: f64,
) -> Vec<usize> {
    let center = located[local_idx].1;
    let lat_pad = meters_to_degrees_lat(radius_meters);
    let lng_pad = meters_to_degrees(radius_meters, center.latitude);

    let envelope = AABB::from_corners(
        [center.latitude - lat_pad, center.longitude - lng_pad],
        [center.latitude + lat_pad, center.longitude + lng_pad],
    );

    let mut neighbors: Vec<usize> = tree
        .locate_in_envelope_intersecting(&envelope)
        .filter(|candidate| {
            haversine_distance(&located[candidate.idx].1, &center) <= radius_meters
        })
        .map(|candidate| candidate.idx)
        .collect();

    neighbors.sort_unstable();
    neighbors
}
