//! Per-client HTML access counters
//!
//! Counts are kept for the process lifetime only. Increments lock a single
//! shard of the map, never the whole structure.

use dashmap::DashMap;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct AccessRecorder {
    counts: DashMap<String, u64>,
}

impl AccessRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one HTML page hit for `ip`
    pub fn record_hit(&self, ip: &str) {
        // Fast path avoids allocating the key for known clients
        if let Some(mut count) = self.counts.get_mut(ip) {
            *count += 1;
            return;
        }
        *self.counts.entry(ip.to_string()).or_insert(0) += 1;
    }

    /// Point-in-time copy of all counters, ordered by IP
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn count(&self, ip: &str) -> u64 {
        self.counts.get(ip).map_or(0, |c| *c)
    }
}
