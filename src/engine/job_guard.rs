//! Per-host-event job mutual exclusion.
//!
//! Discovery and deduplication are background batch jobs; exactly one may
//! be active per host event at a time. A second trigger while one is
//! running fails fast with [`GateMatchError::JobAlreadyRunning`] so callers
//! coalesce instead of racing, which is what eliminates duplicate-creation
//! races between overlapping jobs.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{GateMatchError, Result};

/// Tracks which host events currently have an active job.
///
/// Cloning shares the underlying ledger, so one ledger can guard several
/// engines (or threads) working on the same host event.
#[derive(Debug, Clone, Default)]
pub struct JobLedger {
    active: Arc<Mutex<HashSet<String>>>,
}

impl JobLedger {
    /// Create a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to begin a job for a host event.
    ///
    /// Returns a guard that releases the slot on drop, or
    /// [`GateMatchError::JobAlreadyRunning`] if a job is active.
    pub fn try_begin(&self, host_event_id: &str) -> Result<JobGuard> {
        let mut active = lock_unpoisoned(&self.active);
        if !active.insert(host_event_id.to_string()) {
            return Err(GateMatchError::JobAlreadyRunning {
                host_event_id: host_event_id.to_string(),
            });
        }
        Ok(JobGuard {
            active: Arc::clone(&self.active),
            host_event_id: host_event_id.to_string(),
        })
    }

    /// Whether a job is currently active for the host event.
    pub fn is_active(&self, host_event_id: &str) -> bool {
        lock_unpoisoned(&self.active).contains(host_event_id)
    }
}

/// RAII guard for an active job slot.
#[derive(Debug)]
pub struct JobGuard {
    active: Arc<Mutex<HashSet<String>>>,
    host_event_id: String,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        lock_unpoisoned(&self.active).remove(&self.host_event_id);
    }
}

/// Lock a mutex, recovering the data from a poisoned lock.
///
/// The ledger holds a plain id set with no invariants that a panicking
/// holder could break mid-update.
fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
