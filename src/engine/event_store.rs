//! Check-in event storage.
//!
//! Holds the raw, immutable check-in records for one host event. Events are
//! only ever appended; discovery jobs read them as a sorted batch so every
//! run is a deterministic recompute over the full set.

use std::collections::HashMap;

use crate::CheckInEvent;

/// Storage for check-in events.
#[derive(Debug, Default)]
pub struct EventStore {
    events: HashMap<String, CheckInEvent>,
}

impl EventStore {
    /// Create a new empty event store.
    pub fn new() -> Self {
        Self {
            events: HashMap::new(),
        }
    }

    /// Add a check-in event.
    ///
    /// Returns false if an event with the same id was already stored (the
    /// record is immutable; re-adds are ignored).
    pub fn add(&mut self, event: CheckInEvent) -> bool {
        if self.events.contains_key(&event.id) {
            return false;
        }
        self.events.insert(event.id.clone(), event);
        true
    }

    /// Add multiple check-in events. Returns the number actually added.
    pub fn add_many(&mut self, events: impl IntoIterator<Item = CheckInEvent>) -> usize {
        let mut added = 0;
        for event in events {
            if self.add(event) {
                added += 1;
            }
        }
        added
    }

    /// Get an event by id.
    pub fn get(&self, id: &str) -> Option<&CheckInEvent> {
        self.events.get(id)
    }

    /// Check if an event exists.
    pub fn contains(&self, id: &str) -> bool {
        self.events.contains_key(id)
    }

    /// All event ids.
    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.events.keys()
    }

    /// All events, unordered.
    pub fn values(&self) -> impl Iterator<Item = &CheckInEvent> {
        self.events.values()
    }

    /// All events ordered by (timestamp, id).
    ///
    /// Batch jobs consume this so cluster formation does not depend on
    /// HashMap iteration order.
    pub fn all_sorted(&self) -> Vec<CheckInEvent> {
        let mut batch: Vec<CheckInEvent> = self.events.values().cloned().collect();
        batch.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        batch
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Clear all events.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
