//! # Gate Matcher
//!
//! Gate discovery, binding-confidence, and deduplication engine for
//! event check-in data.
//!
//! Event staff scan wristbands at physical entry points ("gates") whose
//! locations are never configured in advance. This library infers a stable
//! set of gates and their wristband-category bindings from accumulating
//! check-in events:
//!
//! - Density-based spatial clustering of check-ins (Haversine metric)
//! - Wilson lower-bound confidence that a category belongs to a gate
//! - A pure-recompute binding state machine (Unbound / Probation / Enforced)
//! - Virtual, category-pure gates for single-location venues
//! - Duplicate-gate detection and merging across naming variants and GPS drift
//!
//! ## Features
//!
//! - **`parallel`** - Parallel deduplication scanning with rayon
//! - **`synthetic`** - Synthetic venue/check-in generator for stress testing
//! - **`cli`** - Debug CLI binary
//!
//! ## Quick Start
//!
//! ```rust
//! use gatematch::{CheckInEvent, GateDiscoveryEngine};
//!
//! let mut engine = GateDiscoveryEngine::new("summer-fest");
//! for i in 0..25 {
//!     engine.add_check_in(CheckInEvent::located(
//!         format!("evt-{i}"),
//!         format!("wb-{i}"),
//!         "VIP",
//!         1_700_000_000 + i,
//!         47.3769 + (i % 5) as f64 * 0.00001,
//!         8.5417,
//!     ));
//! }
//!
//! // A venue with one physical location gets category-pure virtual gates
//! let report = engine.run_discovery().unwrap();
//! assert_eq!(report.virtual_gates_created.len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Unified error handling
pub mod error;
pub use error::{GateMatchError, Result};

// Union-Find data structure for duplicate grouping
pub mod union_find;
pub use union_find::UnionFind;

// Geographic utilities (distance, centroid, metre offsets)
pub mod geo_utils;

// Spatial clustering of check-in events
pub mod clustering;
pub use clustering::{ClusterOutcome, cluster_events};

// Wilson lower-bound binding confidence
pub mod confidence;
pub use confidence::{CategoryEvidence, estimate_categories, wilson_lower_bound};

// Binding status recompute with hysteresis
pub mod binding;
pub use binding::resolve_status;

// Virtual gate synthesis for single-location venues
pub mod synthesis;
pub use synthesis::{SynthesisOutcome, VirtualGateSpec, synthesize_virtual_gates};

// Deduplication: canonical names, duplicate clustering, merge planning
pub mod dedup;
pub use dedup::{MergePlan, canonical_name, find_duplicate_clusters, plan_merge};

// Modular discovery engine with extracted components
pub mod engine;
pub use engine::{
    EventStore, GateDiscoveryEngine, GateRegistry, GateSpatialIndex, JobLedger, RegistryChangeset,
};

// Synthetic check-in data generator for stress testing and benchmarking
#[cfg(feature = "synthetic")]
pub mod synthetic;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// An immutable wristband check-in record, created once per scan.
///
/// `latitude`/`longitude` are absent for manually-recorded check-ins; the
/// free-text `location_descriptor` then substitutes for spatial grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInEvent {
    /// Unique identifier for this scan.
    pub id: String,
    /// The scanned wristband.
    pub wristband_id: String,
    /// Wristband category at scan time (may be empty for manual entries).
    #[serde(alias = "categoryName")]
    pub category: String,
    /// Unix timestamp (seconds since epoch).
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Free text such as "Manual Check-in - VIP Area" for coordinate-less scans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_descriptor: Option<String>,
    /// Gate recorded by the scanner at check-in time, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_id: Option<String>,
}

impl CheckInEvent {
    /// Create a coordinate-bearing check-in.
    pub fn located(
        id: impl Into<String>,
        wristband_id: impl Into<String>,
        category: impl Into<String>,
        timestamp: i64,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            id: id.into(),
            wristband_id: wristband_id.into(),
            category: category.into(),
            timestamp,
            latitude: Some(latitude),
            longitude: Some(longitude),
            location_descriptor: None,
            gate_id: None,
        }
    }

    /// Create a manual (coordinate-less) check-in with a location descriptor.
    pub fn manual(
        id: impl Into<String>,
        wristband_id: impl Into<String>,
        category: impl Into<String>,
        timestamp: i64,
        location_descriptor: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            wristband_id: wristband_id.into(),
            category: category.into(),
            timestamp,
            latitude: None,
            longitude: None,
            location_descriptor: Some(location_descriptor.into()),
            gate_id: None,
        }
    }

    /// The event's position, if it carries valid coordinates.
    pub fn position(&self) -> Option<GpsPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => {
                let point = GpsPoint::new(lat, lng);
                point.is_valid().then_some(point)
            }
            _ => None,
        }
    }

    /// The category this event counts toward.
    ///
    /// Uses `category` when present, falls back to parsing the location
    /// descriptor for manual entries ("... - VIP Area" yields "VIP"), and
    /// defaults to "General" so every cluster member is counted.
    pub fn effective_category(&self) -> String {
        let trimmed = self.category.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
        self.location_descriptor
            .as_deref()
            .and_then(synthesis::category_from_descriptor)
            .unwrap_or_else(|| "General".to_string())
    }
}

/// How a gate came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateOrigin {
    /// Created by spatial clustering of check-ins.
    Discovered,
    /// Synthesized for a single-location venue, category-pure by construction.
    Virtual,
    /// Created by staff action outside the discovery pipeline.
    Manual,
}

/// A persisted record representing one physical (or virtual) entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gate {
    pub id: String,
    /// The host event this gate belongs to.
    pub host_event_id: String,
    pub name: String,
    /// Absent for gates formed from descriptor-only (manual) check-ins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<GpsPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius_meters: Option<f64>,
    /// Unix timestamp (seconds since epoch).
    pub created_at: i64,
    pub origin: GateOrigin,
}

/// Binding status. Only `Enforced` may be used to deny entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingStatus {
    /// No sufficient evidence; carries no access semantics.
    Unbound,
    /// Sufficient samples, confidence below the enforcement threshold.
    /// Advisory only - must not be used to deny entry.
    Probation,
    /// Sufficient samples and confidence at or above the enforcement threshold.
    Enforced,
}

impl BindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingStatus::Unbound => "unbound",
            BindingStatus::Probation => "probation",
            BindingStatus::Enforced => "enforced",
        }
    }
}

impl std::fmt::Display for BindingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BindingStatus {
    type Err = ();
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "probation" => Ok(BindingStatus::Probation),
            "enforced" => Ok(BindingStatus::Enforced),
            _ => Ok(BindingStatus::Unbound),
        }
    }
}

impl Default for BindingStatus {
    fn default() -> Self {
        BindingStatus::Unbound
    }
}

/// The association between a gate and a wristband category.
///
/// Exactly one binding exists per (gate, category) pair. `sample_count` is
/// non-decreasing except when a merge rewrites it to the sum of the merged
/// bindings' counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateBinding {
    pub gate_id: String,
    pub category: String,
    pub status: BindingStatus,
    /// Wilson lower-bound confidence in [0, 1], always recomputed from raw counts.
    pub confidence: f64,
    /// Count of category-matching check-ins attributed to the gate.
    pub sample_count: u32,
    pub host_event_id: String,
}

/// Result of a binding lookup used by the live entry-policy collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BindingResolution {
    pub status: BindingStatus,
    pub confidence: f64,
}

impl BindingResolution {
    /// Whether this resolution carries deny authority.
    ///
    /// Only `Enforced` bindings may gate access decisions.
    pub fn may_deny(&self) -> bool {
        self.status == BindingStatus::Enforced
    }
}

/// A (category, count) pair used in reports and pending suggestions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u32,
}

// ============================================================================
// Transient Working Types
// ============================================================================

/// A spatial cluster of check-in events (transient, not persisted).
#[derive(Debug, Clone)]
pub struct LocationCluster {
    pub centroid: GpsPoint,
    pub members: Vec<CheckInEvent>,
    /// True when the whole venue collapsed to one physical location and
    /// category separation is deferred to the virtual gate synthesizer.
    pub is_single_location: bool,
}

/// A non-spatial pseudo-cluster of coordinate-less events sharing a
/// location descriptor (transient).
#[derive(Debug, Clone)]
pub struct DescriptorCluster {
    /// The descriptor as staff entered it (first occurrence).
    pub descriptor: String,
    pub members: Vec<CheckInEvent>,
}

/// A group of gates that are really the same physical location
/// (transient deduplication output).
#[derive(Debug, Clone)]
pub struct GateCluster {
    pub primary: Gate,
    pub duplicates: Vec<Gate>,
    pub average_location: Option<GpsPoint>,
    pub total_sample_count: u32,
    pub highest_confidence: f64,
}

/// A would-be gate creation downgraded by the per-event gate cap,
/// awaiting manual approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingGateSuggestion {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<GpsPoint>,
    pub category_counts: Vec<CategoryCount>,
    pub reason: String,
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for clustering, confidence, and binding status.
///
/// Source documentation is inconsistent about several constants (creation
/// threshold 10 vs 20, radii 25 m vs 50 m); all of them are configuration
/// here rather than hard-coded values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Neighborhood radius for density clustering, in meters.
    /// Default: 30.0
    pub epsilon_meters: f64,

    /// Minimum events to seed a cluster; also the creation threshold for
    /// gates and the minimum sample count for a binding to leave `Unbound`.
    /// Default: 10
    pub min_points: usize,

    /// Radius used by single-location detection, in meters.
    /// Default: 50.0
    pub single_location_radius_meters: f64,

    /// Fraction of coordinate-bearing events that must fall within the
    /// single-location radius to flag the venue as single-location.
    /// Default: 0.80
    pub single_location_fraction: f64,

    /// Confidence at or above which a binding becomes `Enforced`.
    /// Default: 0.70
    pub enforcement_threshold: f64,

    /// Hysteresis margin: demotion from `Enforced` requires confidence to
    /// fall below `enforcement_threshold - demotion_hysteresis`.
    /// Default: 0.05
    pub demotion_hysteresis: f64,

    /// z-score for the Wilson lower bound. Default: 1.96 (95%)
    pub confidence_z: f64,

    /// Maximum auto-created gates per host event; further candidates become
    /// pending suggestions. Default: 20
    pub max_gates_per_event: usize,

    /// Offset magnitude for co-located virtual gates, in meters.
    /// Default: 1.0
    pub virtual_gate_offset_meters: f64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            epsilon_meters: 30.0,
            min_points: 10,
            single_location_radius_meters: 50.0,
            single_location_fraction: 0.80,
            enforcement_threshold: 0.70,
            demotion_hysteresis: 0.05,
            confidence_z: 1.96,
            max_gates_per_event: 20,
            virtual_gate_offset_meters: 1.0,
        }
    }
}

/// Configuration for the deduplication engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Two gates with matching canonical names are duplicate candidates when
    /// their centroids are within this radius, in meters. Deliberately wider
    /// than the clustering epsilon to absorb GPS drift. Default: 50.0
    pub dedup_radius_meters: f64,

    /// Tokens stripped from gate names before canonicalization.
    pub generic_tokens: Vec<String>,

    /// Maps stripped name remainders to canonical category keys
    /// (e.g. "vip lounge" -> "vip").
    pub synonyms: HashMap<String, String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        let generic_tokens = [
            "gate", "entrance", "area", "virtual", "zone", "door", "checkin", "check", "in",
            "manual",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let synonyms: HashMap<String, String> = [
            ("vip lounge", "vip"),
            ("vip section", "vip"),
            ("very important person", "vip"),
            ("crew", "staff"),
            ("personnel", "staff"),
            ("media", "press"),
            ("journalist", "press"),
            ("main", "general"),
            ("public", "general"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            dedup_radius_meters: 50.0,
            generic_tokens,
            synonyms,
        }
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Result of a discovery job (plain values from an explicit call; the
/// presentation layer owns any event/callback channel on top of this).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    pub clusters_formed: usize,
    pub descriptor_clusters_formed: usize,
    pub outlier_count: usize,
    pub single_location: bool,
    pub gates_created: Vec<String>,
    /// Existing gate ids that absorbed new cluster data instead of a
    /// duplicate being created.
    pub gates_absorbed_into: Vec<String>,
    pub virtual_gates_created: Vec<String>,
    pub bindings_updated: usize,
    /// Categories below the creation threshold, pending more data.
    pub unassigned_categories: Vec<CategoryCount>,
    pub suggestions_recorded: usize,
}

/// Result of a deduplication job.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupReport {
    pub gates_examined: usize,
    pub duplicate_clusters_found: usize,
    pub gates_retired: Vec<String>,
    pub bindings_rewritten: usize,
}
