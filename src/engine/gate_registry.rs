//! Durable-store collaborator for gates and bindings.
//!
//! The registry owns `Gate` and `GateBinding` records for one host event,
//! plus the retirement remap that keeps historical `CheckInEvent.gate_id`
//! references resolvable after merges, and the pending-suggestion list fed
//! by the gate cap.
//!
//! Jobs never mutate the registry directly: they stage a
//! [`RegistryChangeset`] and commit it with [`GateRegistry::apply`], which
//! validates everything before touching any state. A failed or cancelled
//! job therefore leaves the registry exactly as it was.

use std::collections::HashMap;

use log::{debug, info};

use crate::{
    BindingResolution, BindingStatus, Gate, GateBinding, GateMatchError, GateOrigin, GpsPoint,
    PendingGateSuggestion, Result,
};

/// All mutations of one discovery or deduplication job, applied atomically.
#[derive(Debug, Clone, Default)]
pub struct RegistryChangeset {
    /// Gates to create.
    pub new_gates: Vec<Gate>,
    /// Bindings to insert or replace (one per (gate, category) pair).
    pub binding_upserts: Vec<GateBinding>,
    /// `(retired_id, surviving_id)` pairs from merges.
    pub retirements: Vec<(String, String)>,
    /// Safety-cap downgrades to record.
    pub suggestions: Vec<PendingGateSuggestion>,
}

impl RegistryChangeset {
    /// True when the changeset would not modify anything.
    pub fn is_empty(&self) -> bool {
        self.new_gates.is_empty()
            && self.binding_upserts.is_empty()
            && self.retirements.is_empty()
            && self.suggestions.is_empty()
    }
}

/// In-memory gate and binding store for one host event.
#[derive(Debug, Default)]
pub struct GateRegistry {
    host_event_id: String,
    /// Live gates by id.
    gates: HashMap<String, Gate>,
    /// Retired gates by id (kept for historical reference).
    retired: HashMap<String, Gate>,
    /// Retired id -> surviving id. Chains are followed on resolution.
    remap: HashMap<String, String>,
    /// Live gate id -> bindings, one per category.
    bindings: HashMap<String, Vec<GateBinding>>,
    pending: Vec<PendingGateSuggestion>,
    next_gate_seq: u64,
}

impl GateRegistry {
    /// Create an empty registry for a host event.
    pub fn new(host_event_id: impl Into<String>) -> Self {
        Self {
            host_event_id: host_event_id.into(),
            next_gate_seq: 1,
            ..Self::default()
        }
    }

    /// The host event this registry serves.
    pub fn host_event_id(&self) -> &str {
        &self.host_event_id
    }

    // ========================================================================
    // Id allocation
    // ========================================================================

    /// The next gate sequence number jobs may stage ids from.
    ///
    /// Jobs format staged ids as `gate-<seq>`; [`GateRegistry::apply`]
    /// advances the counter past any applied id, so an abandoned changeset
    /// costs nothing.
    pub fn peek_next_seq(&self) -> u64 {
        self.next_gate_seq
    }

    /// Format a gate id from a sequence number.
    pub fn format_gate_id(seq: u64) -> String {
        format!("gate-{seq}")
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// All live (non-retired) gates.
    pub fn live_gates(&self) -> impl Iterator<Item = &Gate> {
        self.gates.values()
    }

    /// Number of live gates.
    pub fn live_gate_count(&self) -> usize {
        self.gates.len()
    }

    /// A live gate by id (no remap following).
    pub fn gate(&self, id: &str) -> Option<&Gate> {
        self.gates.get(id)
    }

    /// Resolve a possibly-retired gate id to its surviving live gate,
    /// following merge remap chains.
    pub fn resolve_gate(&self, id: &str) -> Option<&Gate> {
        if let Some(gate) = self.gates.get(id) {
            return Some(gate);
        }

        let mut current = id;
        // Chains are short (one hop per merge generation); the walk is
        // bounded by the remap size
        for _ in 0..=self.remap.len() {
            match self.remap.get(current) {
                Some(next) => {
                    if let Some(gate) = self.gates.get(next) {
                        return Some(gate);
                    }
                    current = next;
                }
                None => return None,
            }
        }
        None
    }

    /// Bindings of a live gate.
    pub fn bindings_for(&self, gate_id: &str) -> &[GateBinding] {
        self.bindings.get(gate_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All bindings keyed by live gate id (cloned snapshot for batch jobs).
    pub fn bindings_map(&self) -> HashMap<String, Vec<GateBinding>> {
        self.bindings.clone()
    }

    /// Look up the binding status for a (gate, category) pair.
    ///
    /// Follows the retirement remap so historical gate ids keep resolving.
    /// A live gate without a binding for the category resolves to
    /// `Unbound` with confidence 0 - absence of evidence is not a fault.
    /// Only an `Enforced` result carries deny authority
    /// ([`BindingResolution::may_deny`]).
    pub fn resolve_binding(&self, gate_id: &str, category: &str) -> Result<BindingResolution> {
        let gate = self
            .resolve_gate(gate_id)
            .ok_or_else(|| GateMatchError::UnknownGate {
                gate_id: gate_id.to_string(),
            })?;

        let resolution = self
            .bindings_for(&gate.id)
            .iter()
            .find(|b| b.category == category)
            .map(|b| BindingResolution {
                status: b.status,
                confidence: b.confidence,
            })
            .unwrap_or(BindingResolution {
                status: BindingStatus::Unbound,
                confidence: 0.0,
            });

        Ok(resolution)
    }

    /// The pending gate suggestions awaiting manual approval.
    pub fn pending_suggestions(&self) -> &[PendingGateSuggestion] {
        &self.pending
    }

    // ========================================================================
    // Direct mutations (staff actions, outside batch jobs)
    // ========================================================================

    /// Insert a staff-created gate.
    ///
    /// Manual gates bypass the auto-creation cap; deduplication cleans up
    /// any duplicates they introduce.
    pub fn insert_manual_gate(
        &mut self,
        name: impl Into<String>,
        position: Option<GpsPoint>,
        radius_meters: Option<f64>,
        created_at: i64,
    ) -> String {
        let id = Self::format_gate_id(self.next_gate_seq);
        self.next_gate_seq += 1;

        let gate = Gate {
            id: id.clone(),
            host_event_id: self.host_event_id.clone(),
            name: name.into(),
            position,
            radius_meters,
            created_at,
            origin: GateOrigin::Manual,
        };
        info!("manual gate '{}' created as {}", gate.name, id);
        self.gates.insert(id.clone(), gate);
        id
    }

    /// Approve a pending suggestion, creating its gate.
    ///
    /// Fails with [`GateMatchError::GateCapReached`] while the cap still
    /// holds; the suggestion stays queued in that case.
    pub fn approve_suggestion(
        &mut self,
        index: usize,
        max_gates: usize,
        created_at: i64,
    ) -> Result<String> {
        if index >= self.pending.len() {
            return Err(GateMatchError::SuggestionNotFound { index });
        }
        if self.gates.len() >= max_gates {
            return Err(GateMatchError::GateCapReached { limit: max_gates });
        }

        let suggestion = self.pending.remove(index);
        let id = Self::format_gate_id(self.next_gate_seq);
        self.next_gate_seq += 1;

        let gate = Gate {
            id: id.clone(),
            host_event_id: self.host_event_id.clone(),
            name: suggestion.name,
            position: suggestion.position,
            radius_meters: None,
            created_at,
            origin: GateOrigin::Manual,
        };
        info!("suggestion approved: gate '{}' created as {}", gate.name, id);
        self.gates.insert(id.clone(), gate);
        Ok(id)
    }

    // ========================================================================
    // Atomic changeset application
    // ========================================================================

    /// Validate and apply a job's staged mutations as a single atomic unit.
    ///
    /// Validation covers the whole changeset before any state changes; the
    /// apply phase below it cannot fail. On a validation error nothing is
    /// applied, previously `Enforced` bindings are untouched, and the job
    /// can simply be retried.
    pub fn apply(&mut self, changeset: RegistryChangeset) -> Result<()> {
        self.validate(&changeset)?;

        let RegistryChangeset {
            new_gates,
            binding_upserts,
            retirements,
            suggestions,
        } = changeset;

        for gate in new_gates {
            if let Some(seq) = parse_gate_seq(&gate.id) {
                self.next_gate_seq = self.next_gate_seq.max(seq + 1);
            }
            debug!("gate '{}' created as {}", gate.name, gate.id);
            self.gates.insert(gate.id.clone(), gate);
        }

        for (retired_id, surviving_id) in retirements {
            // Unwrap-free: validation guaranteed the retired gate is live
            if let Some(gate) = self.gates.remove(&retired_id) {
                info!("gate {} retired into {}", retired_id, surviving_id);
                self.retired.insert(retired_id.clone(), gate);
            }
            // Bindings of the retired gate are superseded by merge upserts
            self.bindings.remove(&retired_id);
            self.remap.insert(retired_id, surviving_id);
        }

        for upsert in binding_upserts {
            let gate_bindings = self.bindings.entry(upsert.gate_id.clone()).or_default();
            match gate_bindings
                .iter_mut()
                .find(|b| b.category == upsert.category)
            {
                Some(existing) => *existing = upsert,
                None => gate_bindings.push(upsert),
            }
        }

        self.pending.extend(suggestions);
        Ok(())
    }

    /// Check a changeset's internal consistency against current state.
    fn validate(&self, changeset: &RegistryChangeset) -> Result<()> {
        let invalid = |reason: String| GateMatchError::InvalidChangeset { reason };

        let mut staged_new: HashMap<&str, &Gate> = HashMap::new();
        for gate in &changeset.new_gates {
            if gate.host_event_id != self.host_event_id {
                return Err(invalid(format!(
                    "gate '{}' belongs to host event '{}', registry serves '{}'",
                    gate.id, gate.host_event_id, self.host_event_id
                )));
            }
            if self.gates.contains_key(&gate.id) || self.retired.contains_key(&gate.id) {
                return Err(invalid(format!("gate id '{}' already exists", gate.id)));
            }
            if staged_new.insert(gate.id.as_str(), gate).is_some() {
                return Err(invalid(format!("gate id '{}' staged twice", gate.id)));
            }
        }

        let mut retiring: HashMap<&str, &str> = HashMap::new();
        for (retired_id, surviving_id) in &changeset.retirements {
            if !self.gates.contains_key(retired_id.as_str()) {
                return Err(invalid(format!(
                    "cannot retire '{retired_id}': not a live gate"
                )));
            }
            if retiring
                .insert(retired_id.as_str(), surviving_id.as_str())
                .is_some()
            {
                return Err(invalid(format!("gate '{retired_id}' retired twice")));
            }
        }
        for (retired_id, surviving_id) in &changeset.retirements {
            if retiring.contains_key(surviving_id.as_str()) {
                return Err(invalid(format!(
                    "'{retired_id}' retires into '{surviving_id}', which is itself being retired"
                )));
            }
            let survivor_live = self.gates.contains_key(surviving_id.as_str())
                || staged_new.contains_key(surviving_id.as_str());
            if !survivor_live {
                return Err(invalid(format!(
                    "surviving gate '{surviving_id}' does not exist"
                )));
            }
        }

        let mut seen_pairs: HashMap<(&str, &str), ()> = HashMap::new();
        for upsert in &changeset.binding_upserts {
            if upsert.host_event_id != self.host_event_id {
                return Err(invalid(format!(
                    "binding for gate '{}' belongs to host event '{}'",
                    upsert.gate_id, upsert.host_event_id
                )));
            }
            let target_live = (self.gates.contains_key(&upsert.gate_id)
                || staged_new.contains_key(upsert.gate_id.as_str()))
                && !retiring.contains_key(upsert.gate_id.as_str());
            if !target_live {
                return Err(invalid(format!(
                    "binding targets '{}', which is not a live gate after this changeset",
                    upsert.gate_id
                )));
            }
            if !(0.0..=1.0).contains(&upsert.confidence) {
                return Err(invalid(format!(
                    "binding ({}, {}) has confidence {} outside [0, 1]",
                    upsert.gate_id, upsert.category, upsert.confidence
                )));
            }
            if seen_pairs
                .insert((upsert.gate_id.as_str(), upsert.category.as_str()), ())
                .is_some()
            {
                return Err(invalid(format!(
                    "duplicate binding upsert for ({}, {})",
                    upsert.gate_id, upsert.category
                )));
            }
        }

        Ok(())
    }
}

/// Parse the sequence number out of a `gate-<seq>` id.
fn parse_gate_seq(id: &str) -> Option<u64> {
    id.strip_prefix("gate-")?.parse().ok()
}
