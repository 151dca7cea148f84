//! Counters for refreshes and mutating operations
//!
//! Counter names follow Prometheus conventions so a frontend can export the
//! [`MetricsSnapshot`] without renaming anything.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lock-free counters shared by the synchronizer and the orchestrator.
#[derive(Debug, Default)]
pub struct RegistryMetrics {
    /// Refresh attempts, successful or not
    refresh_total: AtomicU64,
    /// Refresh attempts that did not publish a snapshot
    refresh_failed_total: AtomicU64,
    /// Mutating operations handed to the ledger
    operations_submitted_total: AtomicU64,
    /// Operations that reached finality
    operations_confirmed_total: AtomicU64,
    /// Operations that failed at submission or during the finality wait
    operations_failed_total: AtomicU64,
}

/// Point-in-time copy of [`RegistryMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Refresh attempts, successful or not
    pub refresh_total: u64,
    /// Refresh attempts that did not publish a snapshot
    pub refresh_failed_total: u64,
    /// Mutating operations handed to the ledger
    pub operations_submitted_total: u64,
    /// Operations that reached finality
    pub operations_confirmed_total: u64,
    /// Operations that failed at submission or during the finality wait
    pub operations_failed_total: u64,
}

impl MetricsSnapshot {
    /// Operations submitted but not yet settled either way.
    pub fn operations_in_flight(&self) -> u64 {
        self.operations_submitted_total
            .saturating_sub(self.operations_confirmed_total + self.operations_failed_total)
    }
}

impl RegistryMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one refresh attempt.
    pub fn record_refresh(&self, success: bool) {
        self.refresh_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.refresh_failed_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record that an operation was handed to the ledger.
    pub fn record_submitted(&self) {
        self.operations_submitted_total
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record that an operation reached finality.
    pub fn record_confirmed(&self) {
        self.operations_confirmed_total
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record that an operation failed.
    pub fn record_failed(&self) {
        self.operations_failed_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            refresh_total: self.refresh_total.load(Ordering::Relaxed),
            refresh_failed_total: self.refresh_failed_total.load(Ordering::Relaxed),
            operations_submitted_total: self.operations_submitted_total.load(Ordering::Relaxed),
            operations_confirmed_total: self.operations_confirmed_total.load(Ordering::Relaxed),
            operations_failed_total: self.operations_failed_total.load(Ordering::Relaxed),
        }
    }
}
