//! Counters operators can watch for unexpected exclusion or failure rates.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared between a deriver and whoever reports on it.
#[derive(Debug, Default)]
pub struct DeriveMetrics {
    commits_seen: AtomicU64,
    commits_suppressed: AtomicU64,
    entities_examined: AtomicU64,
    entities_excluded: AtomicU64,
    dropped_references: AtomicU64,
    operations_emitted: AtomicU64,
    derivation_failures: AtomicU64,
    sink_failures: AtomicU64,
}

/// Point-in-time copy of [`DeriveMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeriveStats {
    pub commits_seen: u64,
    pub commits_suppressed: u64,
    pub entities_examined: u64,
    /// Entities skipped because no stable identifier could be resolved.
    pub entities_excluded: u64,
    /// Reference elements dropped from deltas for the same reason.
    pub dropped_references: u64,
    pub operations_emitted: u64,
    pub derivation_failures: u64,
    pub sink_failures: u64,
}

impl DeriveMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_commit(&self) {
        self.commits_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suppressed(&self) {
        self.commits_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_entities(&self, count: usize) {
        self.entities_examined
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_excluded(&self) {
        self.entities_excluded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_reference(&self) {
        self.dropped_references.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_operations(&self, count: usize) {
        self.operations_emitted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.derivation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DeriveStats {
        DeriveStats {
            commits_seen: self.commits_seen.load(Ordering::Relaxed),
            commits_suppressed: self.commits_suppressed.load(Ordering::Relaxed),
            entities_examined: self.entities_examined.load(Ordering::Relaxed),
            entities_excluded: self.entities_excluded.load(Ordering::Relaxed),
            dropped_references: self.dropped_references.load(Ordering::Relaxed),
            operations_emitted: self.operations_emitted.load(Ordering::Relaxed),
            derivation_failures: self.derivation_failures.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }
}

impl DeriveStats {
    /// Share of examined entities that could not be synced.
    pub fn exclusion_rate(&self) -> f64 {
        if self.entities_examined == 0 {
            0.0
        } else {
            self.entities_excluded as f64 / self.entities_examined as f64
        }
    }
}
