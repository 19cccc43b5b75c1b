use std::sync::atomic::{AtomicU64, Ordering};

/// Checkout and release accounting for a connection pool.
///
/// The pool never observes request latency, only checkouts, releases, and
/// health outcomes, so this stays a plain set of counters.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    dials: AtomicU64,
    dial_failures: AtomicU64,
    reuses: AtomicU64,
    failed_health_checks: AtomicU64,
    evictions: AtomicU64,
}

/// Point-in-time view of the pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub dials: u64,
    pub dial_failures: u64,
    pub reuses: u64,
    pub failed_health_checks: u64,
    pub evictions: u64,
}

impl PoolMetrics {
    pub fn record_dial(&self) {
        self.dials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dial_failure(&self) {
        self.dial_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reuse(&self) {
        self.reuses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_health_check(&self) {
        self.failed_health_checks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dials: self.dials.load(Ordering::Relaxed),
            dial_failures: self.dial_failures.load(Ordering::Relaxed),
            reuses: self.reuses.load(Ordering::Relaxed),
            failed_health_checks: self.failed_health_checks.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
