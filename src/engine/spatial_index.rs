//! Spatial indexing of live gates.
//!
//! Uses an R-tree over gate positions for radius queries, with dirty
//! tracking for incremental rebuilds after registry mutations.

use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::GpsPoint;
use crate::geo_utils::{haversine_distance, meters_to_degrees, meters_to_degrees_lat};

use super::gate_registry::GateRegistry;

/// Gate position wrapper for R-tree indexing.
#[derive(Debug, Clone)]
pub struct IndexedGate {
    pub gate_id: String,
    pub lat: f64,
    pub lng: f64,
}

impl RTreeObject for IndexedGate {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

impl PointDistance for IndexedGate {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.lat - point[0];
        let dlng = self.lng - point[1];
        dlat * dlat + dlng * dlng
    }
}

/// Spatial index over the positioned live gates of a registry.
#[derive(Debug, Default)]
pub struct GateSpatialIndex {
    tree: RTree<IndexedGate>,
    dirty: bool,
}

impl GateSpatialIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self {
            tree: RTree::new(),
            dirty: false,
        }
    }

    /// Mark the index as needing rebuild.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Check if the index needs rebuild.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rebuild the index from the registry's live gates.
    ///
    /// Position-less gates (descriptor-only) are not indexed.
    pub fn rebuild(&mut self, registry: &GateRegistry) {
        let indexed: Vec<IndexedGate> = registry
            .live_gates()
            .filter_map(|gate| {
                gate.position.map(|p| IndexedGate {
                    gate_id: gate.id.clone(),
                    lat: p.latitude,
                    lng: p.longitude,
                })
            })
            .collect();

        self.tree = RTree::bulk_load(indexed);
        self.dirty = false;
    }

    /// Ensure the index is up to date.
    pub fn ensure_built(&mut self, registry: &GateRegistry) {
        if self.dirty {
            self.rebuild(registry);
        }
    }

    /// Clear the index.
    pub fn clear(&mut self) {
        self.tree = RTree::new();
        self.dirty = false;
    }

    /// Gate ids within `radius_meters` of a point, sorted for determinism.
    pub fn find_within(&self, point: &GpsPoint, radius_meters: f64) -> Vec<String> {
        let lat_pad = meters_to_degrees_lat(radius_meters);
        let lng_pad = meters_to_degrees(radius_meters, point.latitude);

        let envelope = AABB::from_corners(
            [point.latitude - lat_pad, point.longitude - lng_pad],
            [point.latitude + lat_pad, point.longitude + lng_pad],
        );

        let mut ids: Vec<String> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|g| {
                haversine_distance(&GpsPoint::new(g.lat, g.lng), point) <= radius_meters
            })
            .map(|g| g.gate_id.clone())
            .collect();

        ids.sort();
        ids
    }

    /// Number of indexed gates.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
