use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Running counters for the relay.
#[derive(Debug, Default)]
pub struct RelayStats {
    updates_applied: AtomicU64,
    updates_rejected: AtomicU64,
    persist_failures: AtomicU64,
    deliveries: AtomicU64,
    evictions: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub updates_applied: u64,
    pub updates_rejected: u64,
    pub persist_failures: u64,
    pub deliveries: u64,
    pub evictions: u64,
}

impl RelayStats {
    pub fn record_applied(&self) {
        self.updates_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.updates_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persist_failure(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast(&self, delivered: usize, evicted: usize) {
        self.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            updates_applied: self.updates_applied.load(Ordering::Relaxed),
            updates_rejected: self.updates_rejected.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
