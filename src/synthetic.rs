//! Synthetic check-in data generator for stress testing and benchmarking.
//!
//! Generates realistic venue scenarios with known gate sites and category
//! mixes, providing ground truth for validation of discovery and
//! deduplication.
//!
//! Feature-gated behind `synthetic` — not included in production builds.
//!
//! # Example
//!
//! ```rust
//! use gatematch::GpsPoint;
//! use gatematch::synthetic::{CategoryMix, GateSite, VenueScenario};
//!
//! let scenario = VenueScenario {
//!     origin: GpsPoint::new(47.37, 8.55),
//!     sites: vec![GateSite {
//!         east_meters: 0.0,
//!         north_meters: 0.0,
//!         check_in_count: 200,
//!         mix: vec![
//!             CategoryMix { category: "VIP".into(), weight: 0.7 },
//!             CategoryMix { category: "General".into(), weight: 0.3 },
//!         ],
//!     }],
//!     gps_noise_sigma_meters: 5.0,
//!     manual_fraction: 0.0,
//!     seed: 42,
//! };
//!
//! let dataset = scenario.generate();
//! assert_eq!(dataset.events.len(), 200);
//! ```

use std::f64::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geo_utils::offset_by_meters;
use crate::{CheckInEvent, GpsPoint};

// ============================================================================
// Types
// ============================================================================

/// A category and its share of a site's check-ins.
#[derive(Debug, Clone)]
pub struct CategoryMix {
    pub category: String,
    /// Relative weight; weights are normalized per site.
    pub weight: f64,
}

/// One ground-truth gate site within a venue.
#[derive(Debug, Clone)]
pub struct GateSite {
    /// Offset from the venue origin, in meters east.
    pub east_meters: f64,
    /// Offset from the venue origin, in meters north.
    pub north_meters: f64,
    /// Check-ins to generate at this site.
    pub check_in_count: usize,
    /// Category mix for this site.
    pub mix: Vec<CategoryMix>,
}

/// Scenario configuration for generating a synthetic venue.
#[derive(Debug, Clone)]
pub struct VenueScenario {
    /// Venue origin; all sites are metre offsets from here.
    pub origin: GpsPoint,
    /// Ground-truth gate sites.
    pub sites: Vec<GateSite>,
    /// GPS noise standard deviation in meters.
    pub gps_noise_sigma_meters: f64,
    /// Fraction of check-ins recorded manually (coordinate-less, with a
    /// descriptor naming the site's dominant category).
    pub manual_fraction: f64,
    /// RNG seed for deterministic reproduction.
    pub seed: u64,
}

/// A complete synthetic dataset with ground truth.
#[derive(Debug, Clone)]
pub struct VenueDataset {
    /// Generated check-ins, ordered by timestamp.
    pub events: Vec<CheckInEvent>,
    /// Ground-truth site positions, parallel to `VenueScenario::sites`.
    pub site_positions: Vec<GpsPoint>,
}

// ============================================================================
// Generation
// ============================================================================

impl VenueScenario {
    /// Generate the scenario's check-in events.
    ///
    /// Deterministic for a fixed seed: the same scenario always produces
    /// the same events.
    pub fn generate(&self) -> VenueDataset {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut events = Vec::new();
        let mut site_positions = Vec::new();
        let base_timestamp: i64 = 1_700_000_000;

        for (site_idx, site) in self.sites.iter().enumerate() {
            let site_position =
                offset_by_meters(&self.origin, site.east_meters, site.north_meters);
            site_positions.push(site_position);

            let total_weight: f64 = site.mix.iter().map(|m| m.weight).sum();

            for scan in 0..site.check_in_count {
                let category = pick_category(&site.mix, total_weight, &mut rng);
                let event_id = format!("evt-{site_idx}-{scan}");
                let wristband_id = format!("wb-{site_idx}-{scan}");
                let timestamp = base_timestamp + (site_idx * 10_000 + scan) as i64;

                let event = if rng.random::<f64>() < self.manual_fraction {
                    CheckInEvent::manual(
                        event_id,
                        wristband_id,
                        category.clone(),
                        timestamp,
                        format!("Manual Check-in - {category} Area"),
                    )
                } else {
                    let east_noise = normal(&mut rng) * self.gps_noise_sigma_meters;
                    let north_noise = normal(&mut rng) * self.gps_noise_sigma_meters;
                    let position = offset_by_meters(&site_position, east_noise, north_noise);
                    CheckInEvent::located(
                        event_id,
                        wristband_id,
                        category,
                        timestamp,
                        position.latitude,
                        position.longitude,
                    )
                };

                events.push(event);
            }
        }

        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

        VenueDataset {
            events,
            site_positions,
        }
    }
}

/// Pick a category according to the site's normalized weights.
fn pick_category(mix: &[CategoryMix], total_weight: f64, rng: &mut StdRng) -> String {
    if mix.is_empty() || total_weight <= 0.0 {
        return "General".to_string();
    }

    let mut roll = rng.random::<f64>() * total_weight;
    for entry in mix {
        roll -= entry.weight;
        if roll <= 0.0 {
            return entry.category.clone();
        }
    }
    mix[mix.len() - 1].category.clone()
}

/// Standard normal sample via Box-Muller.
fn normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.random_range(f64::MIN_POSITIVE..1.0);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}
