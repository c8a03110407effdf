//! Metrics registry
//!
//! - Counters only, monotonic
//! - Reset only when the store is opened
//! - Thread-safe but lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters of one store.
///
/// Uses Relaxed ordering; counters are diagnostics, never synchronization.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    transactions_begun: AtomicU64,
    commits: AtomicU64,
    empty_commits: AtomicU64,
    conflicts: AtomicU64,
    rollbacks: AtomicU64,
    wal_bytes_written: AtomicU64,
    wal_records_written: AtomicU64,
    wal_records_replayed: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_transactions_begun(&self) {
        self.transactions_begun.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commits(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    /// Commits whose delta applied no change and consumed no version.
    pub fn increment_empty_commits(&self) {
        self.empty_commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_conflicts(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rollbacks(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    // WAL metrics

    pub fn add_wal_bytes(&self, bytes: u64) {
        self.wal_bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn increment_wal_records(&self) {
        self.wal_records_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_wal_replayed(&self) {
        self.wal_records_replayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    pub fn conflicts(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            transactions_begun: self.transactions_begun.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            empty_commits: self.empty_commits.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            wal_bytes_written: self.wal_bytes_written.load(Ordering::Relaxed),
            wal_records_written: self.wal_records_written.load(Ordering::Relaxed),
            wal_records_replayed: self.wal_records_replayed.load(Ordering::Relaxed),
        }
    }
}

/// Copy of the counters at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub transactions_begun: u64,
    pub commits: u64,
    pub empty_commits: u64,
    pub conflicts: u64,
    pub rollbacks: u64,
    pub wal_bytes_written: u64,
    pub wal_records_written: u64,
    pub wal_records_replayed: u64,
}
