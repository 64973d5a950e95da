//! Unified error handling for gate discovery operations.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GateMatchError>;

/// Errors that can occur during discovery, binding, and deduplication jobs.
#[derive(Debug, Clone, Error)]
pub enum GateMatchError {
    /// A discovery or deduplication job is already running for this host event.
    ///
    /// Jobs are mutually exclusive per host event; the caller should retry
    /// after the active job completes.
    #[error("a job is already running for host event '{host_event_id}'")]
    JobAlreadyRunning { host_event_id: String },

    /// A gate id did not resolve to a live gate, even after following the
    /// retirement remap.
    #[error("unknown gate '{gate_id}'")]
    UnknownGate { gate_id: String },

    /// A staged registry changeset failed validation; nothing was applied.
    #[error("invalid registry changeset: {reason}")]
    InvalidChangeset { reason: String },

    /// The per-event gate cap prevents creating another gate.
    #[error("gate cap reached ({limit} gates); creation downgraded to a suggestion")]
    GateCapReached { limit: usize },

    /// A pending suggestion index was out of range.
    #[error("no pending suggestion at index {index}")]
    SuggestionNotFound { index: usize },
}
