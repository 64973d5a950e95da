//! # Modular Gate Discovery Engine
//!
//! This module provides the discovery engine with focused subcomponents for
//! better testability and maintainability.
//!
//! ## Architecture
//!
//! The engine is composed of focused modules:
//! - `EventStore` - Immutable check-in storage
//! - `GateRegistry` - Gate/binding store with atomic changesets and merge remap
//! - `GateSpatialIndex` - R-tree over live gate positions
//! - `JobLedger` - Per-host-event job mutual exclusion
//!
//! Discovery and deduplication run as batch jobs over the full event set:
//! cluster, estimate, resolve statuses, then commit every registry mutation
//! as one atomic changeset. Nothing is visible to readers mid-computation.

pub mod event_store;
pub mod gate_registry;
pub mod job_guard;
pub mod spatial_index;

pub use event_store::EventStore;
pub use gate_registry::{GateRegistry, RegistryChangeset};
pub use job_guard::{JobGuard, JobLedger};
pub use spatial_index::{GateSpatialIndex, IndexedGate};

use std::collections::BTreeMap;

use log::{info, warn};

use crate::confidence::wilson_lower_bound;
use crate::dedup::{find_absorbing_gate, find_duplicate_clusters, plan_merge};
use crate::{
    BindingResolution, CategoryCount, CheckInEvent, DedupConfig, DedupReport, DiscoveryConfig,
    DiscoveryReport, Gate, GateBinding, GateOrigin, GpsPoint, PendingGateSuggestion, Result,
    binding, cluster_events, synthesize_virtual_gates,
};

/// Evidence staged against one target gate during a discovery job.
#[derive(Debug, Default)]
struct StagedEvidence {
    /// Total events routed to the gate this batch.
    total: u32,
    /// Per-category counts. BTreeMap keeps upsert order deterministic.
    counts: BTreeMap<String, u32>,
    /// Latest member timestamp, used as `created_at` for new gates.
    latest_timestamp: i64,
}

impl StagedEvidence {
    fn absorb(&mut self, counts: &BTreeMap<String, u32>, latest_timestamp: i64) {
        for (category, count) in counts {
            *self.counts.entry(category.clone()).or_insert(0) += count;
            self.total += count;
        }
        self.latest_timestamp = self.latest_timestamp.max(latest_timestamp);
    }
}

/// Working state of one discovery job: the changeset being staged plus
/// per-gate evidence, all local until the final atomic commit.
#[derive(Debug, Default)]
struct DiscoveryJob {
    changeset: RegistryChangeset,
    /// Staged evidence per target gate id, in routing order.
    staged: Vec<(String, StagedEvidence)>,
    next_seq: u64,
    report: DiscoveryReport,
}

/// Gate discovery engine for one host event.
///
/// Consumes check-in events and produces/mutates `Gate` and `GateBinding`
/// records through explicit batch calls ([`Self::run_discovery`],
/// [`Self::run_deduplication`]) that return plain report values.
pub struct GateDiscoveryEngine {
    host_event_id: String,

    // Core components
    pub events: EventStore,
    pub registry: GateRegistry,
    pub spatial: GateSpatialIndex,

    jobs: JobLedger,
    discovery_config: DiscoveryConfig,
    dedup_config: DedupConfig,
}

impl GateDiscoveryEngine {
    /// Create a new engine with default configuration.
    pub fn new(host_event_id: impl Into<String>) -> Self {
        let host_event_id = host_event_id.into();
        Self {
            events: EventStore::new(),
            registry: GateRegistry::new(host_event_id.clone()),
            spatial: GateSpatialIndex::new(),
            jobs: JobLedger::new(),
            discovery_config: DiscoveryConfig::default(),
            dedup_config: DedupConfig::default(),
            host_event_id,
        }
    }

    /// Create a new engine with custom configuration.
    pub fn with_config(
        host_event_id: impl Into<String>,
        discovery_config: DiscoveryConfig,
        dedup_config: DedupConfig,
    ) -> Self {
        Self {
            discovery_config,
            dedup_config,
            ..Self::new(host_event_id)
        }
    }

    /// Share a job ledger with other engines or threads serving the same
    /// host event.
    pub fn with_job_ledger(mut self, jobs: JobLedger) -> Self {
        self.jobs = jobs;
        self
    }

    /// The host event this engine serves.
    pub fn host_event_id(&self) -> &str {
        &self.host_event_id
    }

    // ========================================================================
    // Event intake (delegates to EventStore)
    // ========================================================================

    /// Record a check-in event. Returns false for a duplicate id.
    pub fn add_check_in(&mut self, event: CheckInEvent) -> bool {
        self.events.add(event)
    }

    /// Record multiple check-in events. Returns the number actually added.
    pub fn add_check_ins(&mut self, events: impl IntoIterator<Item = CheckInEvent>) -> usize {
        self.events.add_many(events)
    }

    /// Number of stored check-ins.
    pub fn check_in_count(&self) -> usize {
        self.events.len()
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    pub fn discovery_config(&self) -> &DiscoveryConfig {
        &self.discovery_config
    }

    pub fn set_discovery_config(&mut self, config: DiscoveryConfig) {
        self.discovery_config = config;
    }

    pub fn dedup_config(&self) -> &DedupConfig {
        &self.dedup_config
    }

    pub fn set_dedup_config(&mut self, config: DedupConfig) {
        self.dedup_config = config;
    }

    // ========================================================================
    // Binding resolution (for the live entry-policy collaborator)
    // ========================================================================

    /// Look up the binding status for a (gate, category) pair, following
    /// the merge remap. Only `Enforced` results carry deny authority.
    pub fn resolve_binding(&self, gate_id: &str, category: &str) -> Result<BindingResolution> {
        self.registry.resolve_binding(gate_id, category)
    }

    // ========================================================================
    // Discovery job
    // ========================================================================

    /// Run a discovery batch: cluster all check-ins, create or update gates
    /// and bindings, and commit the result atomically.
    ///
    /// Exactly one job may run per host event; a concurrent trigger fails
    /// with [`crate::GateMatchError::JobAlreadyRunning`] and should be
    /// retried after the active job completes. The job has no side effects
    /// until the final commit, so failures are safely retryable.
    pub fn run_discovery(&mut self) -> Result<DiscoveryReport> {
        let _guard = self.jobs.try_begin(&self.host_event_id)?;

        let batch = self.events.all_sorted();
        let outcome = cluster_events(&batch, &self.discovery_config);

        let mut job = DiscoveryJob {
            next_seq: self.registry.peek_next_seq(),
            report: DiscoveryReport {
                clusters_formed: outcome.clusters.len(),
                descriptor_clusters_formed: outcome.descriptor_clusters.len(),
                outlier_count: outcome.outlier_ids.len(),
                single_location: outcome.is_single_location,
                ..DiscoveryReport::default()
            },
            ..DiscoveryJob::default()
        };

        for cluster in &outcome.clusters {
            if cluster.is_single_location {
                let synthesis = synthesize_virtual_gates(cluster, &self.discovery_config);
                let latest = latest_timestamp(&cluster.members);

                for spec in &synthesis.gates {
                    let counts = BTreeMap::from([(spec.category.clone(), spec.sample_count)]);
                    self.route_to_gate(
                        &mut job,
                        &spec.name,
                        Some(spec.position),
                        GateOrigin::Virtual,
                        counts,
                        latest,
                    );
                }

                job.report.unassigned_categories.extend(synthesis.unassigned);
                continue;
            }

            let counts = category_counts(&cluster.members);
            let latest = latest_timestamp(&cluster.members);
            let proposed_name = format!("Gate {}", job.next_seq);
            self.route_to_gate(
                &mut job,
                &proposed_name,
                Some(cluster.centroid),
                GateOrigin::Discovered,
                counts,
                latest,
            );
        }

        for descriptor_cluster in &outcome.descriptor_clusters {
            // Pseudo-clusters participate only once they could seed a real
            // cluster; smaller groups wait for more data
            if descriptor_cluster.members.len() < self.discovery_config.min_points {
                job.report.unassigned_categories.extend(
                    category_counts(&descriptor_cluster.members)
                        .into_iter()
                        .map(|(category, count)| CategoryCount { category, count }),
                );
                continue;
            }

            let counts = category_counts(&descriptor_cluster.members);
            let latest = latest_timestamp(&descriptor_cluster.members);
            self.route_to_gate(
                &mut job,
                descriptor_cluster.descriptor.as_str(),
                None,
                GateOrigin::Discovered,
                counts,
                latest,
            );
        }

        // Turn staged evidence into binding upserts with recomputed
        // confidence and status
        let DiscoveryJob {
            mut changeset,
            staged,
            mut report,
            ..
        } = job;
        for (gate_id, evidence) in &staged {
            for (category, &count) in &evidence.counts {
                let confidence = if (evidence.total as usize) < self.discovery_config.min_points {
                    0.0
                } else {
                    wilson_lower_bound(count, evidence.total, self.discovery_config.confidence_z)
                };
                let previous = self
                    .registry
                    .bindings_for(gate_id)
                    .iter()
                    .find(|b| b.category == *category)
                    .map(|b| b.status);
                let status =
                    binding::resolve_status(count, confidence, previous, &self.discovery_config);

                changeset.binding_upserts.push(GateBinding {
                    gate_id: gate_id.clone(),
                    category: category.clone(),
                    status,
                    confidence,
                    sample_count: count,
                    host_event_id: self.host_event_id.clone(),
                });
            }
        }
        report.bindings_updated = changeset.binding_upserts.len();

        self.registry.apply(changeset)?;
        self.spatial.mark_dirty();

        info!(
            "discovery for '{}': {} clusters, {} gates created, {} bindings updated",
            self.host_event_id,
            report.clusters_formed,
            report.gates_created.len() + report.virtual_gates_created.len(),
            report.bindings_updated
        );

        Ok(report)
    }

    /// Route one cluster's evidence to a gate: absorb into an existing or
    /// already-staged gate when the canonical-name + distance test matches,
    /// otherwise create a gate (or a pending suggestion once the cap is
    /// reached).
    fn route_to_gate(
        &self,
        job: &mut DiscoveryJob,
        name: &str,
        position: Option<GpsPoint>,
        origin: GateOrigin,
        counts: BTreeMap<String, u32>,
        latest_timestamp: i64,
    ) {
        // Global safety check: the entire live gate set plus the gates this
        // job has already staged, never just the local cluster
        let target_id = find_absorbing_gate(
            name,
            position.as_ref(),
            self.registry
                .live_gates()
                .chain(job.changeset.new_gates.iter()),
            &self.dedup_config,
        )
        .map(|gate| gate.id.clone());

        let gate_id = match target_id {
            Some(id) => {
                if self.registry.gate(&id).is_some() {
                    job.report.gates_absorbed_into.push(id.clone());
                }
                id
            }
            None => {
                let live_after_staging =
                    self.registry.live_gate_count() + job.changeset.new_gates.len();
                if live_after_staging >= self.discovery_config.max_gates_per_event {
                    warn!(
                        "gate cap ({}) reached for '{}'; recording suggestion '{}'",
                        self.discovery_config.max_gates_per_event, self.host_event_id, name
                    );
                    job.changeset.suggestions.push(PendingGateSuggestion {
                        name: name.to_string(),
                        position,
                        category_counts: counts
                            .iter()
                            .map(|(category, count)| CategoryCount {
                                category: category.clone(),
                                count: *count,
                            })
                            .collect(),
                        reason: format!(
                            "gate cap of {} reached",
                            self.discovery_config.max_gates_per_event
                        ),
                    });
                    job.report.suggestions_recorded += 1;
                    return;
                }

                let id = GateRegistry::format_gate_id(job.next_seq);
                job.next_seq += 1;
                job.changeset.new_gates.push(Gate {
                    id: id.clone(),
                    host_event_id: self.host_event_id.clone(),
                    name: name.to_string(),
                    position,
                    radius_meters: position.map(|_| self.discovery_config.epsilon_meters),
                    created_at: latest_timestamp,
                    origin,
                });
                if origin == GateOrigin::Virtual {
                    job.report.virtual_gates_created.push(id.clone());
                } else {
                    job.report.gates_created.push(id.clone());
                }
                id
            }
        };

        match job.staged.iter_mut().find(|(id, _)| *id == gate_id) {
            Some((_, evidence)) => evidence.absorb(&counts, latest_timestamp),
            None => {
                let mut evidence = StagedEvidence::default();
                evidence.absorb(&counts, latest_timestamp);
                job.staged.push((gate_id, evidence));
            }
        }
    }

    // ========================================================================
    // Deduplication job
    // ========================================================================

    /// Run a deduplication batch over the persisted gate set.
    ///
    /// Duplicate clusters are merged all-or-nothing: the primary gate takes
    /// summed per-category counts with confidence recomputed from the
    /// combined raw counts, duplicates are retired with an id remap, and
    /// the whole result commits atomically. Idempotent with no new data.
    pub fn run_deduplication(&mut self) -> Result<DedupReport> {
        let _guard = self.jobs.try_begin(&self.host_event_id)?;

        let gates: Vec<Gate> = self.registry.live_gates().cloned().collect();
        let bindings_by_gate = self.registry.bindings_map();

        let clusters = find_duplicate_clusters(&gates, &bindings_by_gate, &self.dedup_config);

        let mut report = DedupReport {
            gates_examined: gates.len(),
            duplicate_clusters_found: clusters.len(),
            ..DedupReport::default()
        };

        let mut changeset = RegistryChangeset::default();
        for cluster in &clusters {
            let plan = plan_merge(cluster, &bindings_by_gate, &self.discovery_config);
            report.gates_retired.extend(plan.retired_ids.iter().cloned());
            report.bindings_rewritten += plan.bindings.len();
            changeset.retirements.extend(
                plan.retired_ids
                    .into_iter()
                    .map(|retired| (retired, plan.primary_id.clone())),
            );
            changeset.binding_upserts.extend(plan.bindings);
        }

        self.registry.apply(changeset)?;
        self.spatial.mark_dirty();

        info!(
            "deduplication for '{}': {} clusters merged, {} gates retired",
            self.host_event_id,
            report.duplicate_clusters_found,
            report.gates_retired.len()
        );

        Ok(report)
    }

    // ========================================================================
    // Read API for the presentation layer
    // ========================================================================

    /// Live gates as a JSON array.
    pub fn live_gates_json(&self) -> String {
        let mut gates: Vec<&Gate> = self.registry.live_gates().collect();
        gates.sort_by(|a, b| a.id.cmp(&b.id));
        serde_json::to_string(&gates).unwrap_or_else(|e| {
            warn!("failed to serialize live gates: {}", e);
            "[]".to_string()
        })
    }

    /// A gate's bindings as a JSON array.
    pub fn bindings_json(&self, gate_id: &str) -> String {
        serde_json::to_string(self.registry.bindings_for(gate_id)).unwrap_or_else(|e| {
            warn!("failed to serialize bindings for gate '{}': {}", gate_id, e);
            "[]".to_string()
        })
    }

    /// Pending gate suggestions as a JSON array.
    pub fn pending_suggestions_json(&self) -> String {
        serde_json::to_string(self.registry.pending_suggestions()).unwrap_or_else(|e| {
            warn!("failed to serialize pending suggestions: {}", e);
            "[]".to_string()
        })
    }

    /// Live gate ids within `radius_meters` of a point.
    ///
    /// Backs "which gate am I standing at" lookups in the scanner flow.
    pub fn gates_near(&mut self, point: &GpsPoint, radius_meters: f64) -> Vec<String> {
        self.spatial.ensure_built(&self.registry);
        self.spatial.find_within(point, radius_meters)
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Engine statistics for monitoring.
    pub fn stats(&mut self) -> EngineStats {
        self.spatial.ensure_built(&self.registry);
        EngineStats {
            check_in_count: self.events.len() as u32,
            live_gate_count: self.registry.live_gate_count() as u32,
            indexed_gate_count: self.spatial.len() as u32,
            pending_suggestion_count: self.registry.pending_suggestions().len() as u32,
        }
    }
}

/// Engine statistics for monitoring.
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub check_in_count: u32,
    pub live_gate_count: u32,
    pub indexed_gate_count: u32,
    pub pending_suggestion_count: u32,
}

/// Per-category counts for a set of cluster members.
fn category_counts(members: &[CheckInEvent]) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for event in members {
        *counts.entry(event.effective_category()).or_insert(0) += 1;
    }
    counts
}

/// Latest member timestamp; new gates are stamped with the time the
/// evidence that created them arrived.
fn latest_timestamp(members: &[CheckInEvent]) -> i64 {
    members.iter().map(|e| e.timestamp).max().unwrap_or(0)
}
