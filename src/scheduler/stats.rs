/*!
 * Lock-Free Engine Statistics
 * Atomic counters for zero-contention updates on the tick path
 */

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic engine statistics for lock-free updates
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct AtomicEngineStats {
    ticks: AtomicU64,
    dispatches: AtomicU64,
    preemptions: AtomicU64,
    reaped: AtomicU64,
    admitted: AtomicU64,
    rejected: AtomicU64,
}

impl AtomicEngineStats {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn inc_ticks(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn add_dispatches(&self, n: u64) {
        self.dispatches.fetch_add(n, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn add_preemptions(&self, n: u64) {
        self.preemptions.fetch_add(n, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_reaped(&self) {
        self.reaped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Counter values may lag each other under concurrent updates; each
    /// individual value is accurate, which is enough for monitoring.
    #[inline]
    pub fn snapshot(&self) -> EngineStats {
        EngineStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            dispatches: self.dispatches.load(Ordering::Relaxed),
            preemptions: self.preemptions.load(Ordering::Relaxed),
            reaped: self.reaped.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Engine statistics snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineStats {
    pub ticks: u64,
    pub dispatches: u64,
    pub preemptions: u64,
    pub reaped: u64,
    pub admitted: u64,
    pub rejected: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = AtomicEngineStats::new();
        stats.inc_ticks();
        stats.add_dispatches(3);
        stats.add_preemptions(2);
        stats.inc_reaped();
        stats.inc_admitted();
        stats.inc_rejected();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.ticks, 1);
        assert_eq!(snapshot.dispatches, 3);
        assert_eq!(snapshot.preemptions, 2);
        assert_eq!(snapshot.reaped, 1);
        assert_eq!(snapshot.admitted, 1);
        assert_eq!(snapshot.rejected, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = AtomicEngineStats::new();
        stats.inc_ticks();
        let json = serde_json::to_string(&stats.snapshot()).unwrap();
        assert!(json.contains("\"ticks\":1"));
    }
}
