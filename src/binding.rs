//! Gate binding status resolution.
//!
//! Status is a pure, idempotent function of the current
//! `(sample_count, confidence)`, recomputed on every batch - not a
//! path-dependent machine. Direct `Unbound -> Enforced` is allowed when the
//! first batch already clears both thresholds, and `Enforced -> Probation`
//! demotion happens when later mixed data drags confidence down. A
//! hysteresis margin prevents oscillation from noise near the boundary.

use crate::{BindingStatus, DiscoveryConfig};

/// Resolve a binding's status from its current evidence.
///
/// `previous` is consulted only for hysteresis: an already-`Enforced`
/// binding holds its status until confidence falls below
/// `enforcement_threshold - demotion_hysteresis`, not merely below the
/// threshold.
pub fn resolve_status(
    sample_count: u32,
    confidence: f64,
    previous: Option<BindingStatus>,
    config: &DiscoveryConfig,
) -> BindingStatus {
    if (sample_count as usize) < config.min_points {
        return BindingStatus::Unbound;
    }

    if confidence >= config.enforcement_threshold {
        return BindingStatus::Enforced;
    }

    // Hysteresis hold band for bindings that are already enforced
    if previous == Some(BindingStatus::Enforced)
        && confidence >= config.enforcement_threshold - config.demotion_hysteresis
    {
        return BindingStatus::Enforced;
    }

    BindingStatus::Probation
}
