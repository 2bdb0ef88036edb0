// SPDX-License-Identifier: MIT
//! In-process counters for store activity.
//!
//! All counters are `AtomicU64` incremented inline — no external
//! library needed. `snapshot()` gives a consistent-enough view for
//! diagnostics; counts are advisory, not truth.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-session mutation and reconciliation counters.
#[derive(Debug, Default)]
pub struct StoreMetrics {
    pub adds: AtomicU64,
    pub updates: AtomicU64,
    pub deletes: AtomicU64,
    pub clears: AtomicU64,
    pub bulk_updates: AtomicU64,
    /// Failed transactions that were rolled back.
    pub rollbacks: AtomicU64,
    /// Realtime events applied to the cache (deferred ones count when
    /// they land).
    pub realtime_applied: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub adds: u64,
    pub updates: u64,
    pub deletes: u64,
    pub clears: u64,
    pub bulk_updates: u64,
    pub rollbacks: u64,
    pub realtime_applied: u64,
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_adds(&self) {
        self.adds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_updates(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_deletes(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_clears(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_bulk_updates(&self) {
        self.bulk_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rollbacks(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_realtime_applied(&self) {
        self.realtime_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            adds: self.adds.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            bulk_updates: self.bulk_updates.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            realtime_applied: self.realtime_applied.load(Ordering::Relaxed),
        }
    }
}
