//! Engine counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::security::Operation;

/// Counters collected by the entity service and its collaborators.
#[derive(Debug)]
pub struct EngineMetrics {
    started_at: Instant,

    // Operations
    creates: AtomicU64,
    reads: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    lists: AtomicU64,

    // Rejections
    denials: AtomicU64,
    integrity_violations: AtomicU64,
    schema_violations: AtomicU64,

    // Aggregation
    recomputes: AtomicU64,
    recompute_conflicts: AtomicU64,
    recompute_failures: AtomicU64,
    cascaded_records: AtomicU64,
}

/// Point-in-time copy of [`EngineMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Seconds since the metrics were created.
    pub uptime_secs: u64,
    /// Create operations.
    pub creates: u64,
    /// Read operations.
    pub reads: u64,
    /// Update operations.
    pub updates: u64,
    /// Delete operations.
    pub deletes: u64,
    /// List operations.
    pub lists: u64,
    /// Authorization denials.
    pub denials: u64,
    /// Referential integrity violations.
    pub integrity_violations: u64,
    /// Schema violations.
    pub schema_violations: u64,
    /// Completed rating recomputations.
    pub recomputes: u64,
    /// Compare-and-set conflicts hit while writing derived fields.
    pub recompute_conflicts: u64,
    /// Recomputations that gave up.
    pub recompute_failures: u64,
    /// Dependent records removed or cleared by delete cascades.
    pub cascaded_records: u64,
}

impl EngineMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            creates: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            updates: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            lists: AtomicU64::new(0),
            denials: AtomicU64::new(0),
            integrity_violations: AtomicU64::new(0),
            schema_violations: AtomicU64::new(0),
            recomputes: AtomicU64::new(0),
            recompute_conflicts: AtomicU64::new(0),
            recompute_failures: AtomicU64::new(0),
            cascaded_records: AtomicU64::new(0),
        }
    }

    /// Record an entity operation.
    pub fn record_operation(&self, op: Operation) {
        let counter = match op {
            Operation::Create => &self.creates,
            Operation::Read => &self.reads,
            Operation::Update => &self.updates,
            Operation::Delete => &self.deletes,
            Operation::List => &self.lists,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an authorization denial.
    pub fn record_denial(&self) {
        self.denials.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dangling reference rejection.
    pub fn record_integrity_violation(&self) {
        self.integrity_violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a schema rejection.
    pub fn record_schema_violation(&self) {
        self.schema_violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed recomputation.
    pub fn record_recompute(&self) {
        self.recomputes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lost compare-and-set on a property.
    pub fn record_recompute_conflict(&self) {
        self.recompute_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an abandoned recomputation.
    pub fn record_recompute_failure(&self) {
        self.recompute_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record records affected by a cascade.
    pub fn record_cascade(&self, records: u64) {
        self.cascaded_records.fetch_add(records, Ordering::Relaxed);
    }

    /// Get completed recomputations.
    pub fn recomputes(&self) -> u64 {
        self.recomputes.load(Ordering::Relaxed)
    }

    /// Get authorization denials.
    pub fn denials(&self) -> u64 {
        self.denials.load(Ordering::Relaxed)
    }

    /// Copy every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs(),
            creates: self.creates.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            lists: self.lists.load(Ordering::Relaxed),
            denials: self.denials.load(Ordering::Relaxed),
            integrity_violations: self.integrity_violations.load(Ordering::Relaxed),
            schema_violations: self.schema_violations.load(Ordering::Relaxed),
            recomputes: self.recomputes.load(Ordering::Relaxed),
            recompute_conflicts: self.recompute_conflicts.load(Ordering::Relaxed),
            recompute_failures: self.recompute_failures.load(Ordering::Relaxed),
            cascaded_records: self.cascaded_records.load(Ordering::Relaxed),
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics handle.
pub type SharedMetrics = Arc<EngineMetrics>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_counters() {
        let metrics = EngineMetrics::new();
        metrics.record_operation(Operation::Create);
        metrics.record_operation(Operation::Create);
        metrics.record_operation(Operation::List);
        metrics.record_denial();

        let snap = metrics.snapshot();
        assert_eq!(snap.creates, 2);
        assert_eq!(snap.lists, 1);
        assert_eq!(snap.reads, 0);
        assert_eq!(snap.denials, 1);
        assert_eq!(metrics.denials(), 1);
    }

    #[test]
    fn test_cascade_counter_accumulates() {
        let metrics = EngineMetrics::new();
        metrics.record_cascade(3);
        metrics.record_cascade(2);
        assert_eq!(metrics.snapshot().cascaded_records, 5);
    }
}
