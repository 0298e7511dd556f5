//! Binder statistics
//!
//! Each worker owns one cache-line aligned slot and is its only writer, so
//! the hot path never contends with other workers. Totals are summed when a
//! snapshot is requested and are only eventually consistent.

use crate::Action;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-worker counters (cache-line aligned)
#[derive(Debug, Default)]
#[repr(C, align(64))]
pub struct WorkerStats {
    packets: AtomicU64,
    blocks: AtomicU64,
    allows: AtomicU64,
    inspects: AtomicU64,
}

impl WorkerStats {
    /// Count one resolution with the given action
    #[inline(always)]
    pub fn record(&self, action: Action) {
        self.packets.fetch_add(1, Ordering::Relaxed);
        let counter = match action.effective() {
            Action::Block => &self.blocks,
            Action::Allow => &self.allows,
            _ => &self.inspects,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read this worker's counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets: self.packets.load(Ordering::Relaxed),
            blocks: self.blocks.load(Ordering::Relaxed),
            allows: self.allows.load(Ordering::Relaxed),
            inspects: self.inspects.load(Ordering::Relaxed),
        }
    }
}

/// Counter snapshot (non-atomic)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Packets evaluated
    pub packets: u64,
    /// Resolutions to block
    pub blocks: u64,
    /// Resolutions to allow
    pub allows: u64,
    /// Resolutions to inspect
    pub inspects: u64,
}

impl StatsSnapshot {
    /// Counter names in export order
    pub const PEGS: [&'static str; 4] = ["packets", "blocks", "allows", "inspects"];

    /// Named counters in export order
    pub fn pegs(&self) -> [(&'static str, u64); 4] {
        let [p, b, a, i] = Self::PEGS;
        [(p, self.packets), (b, self.blocks), (a, self.allows), (i, self.inspects)]
    }

    fn accumulate(&mut self, other: &Self) {
        self.packets += other.packets;
        self.blocks += other.blocks;
        self.allows += other.allows;
        self.inspects += other.inspects;
    }
}

/// Counter slots for all workers
#[derive(Debug)]
pub struct BindStats {
    workers: Vec<WorkerStats>,
}

impl BindStats {
    /// Create `num_workers` zeroed slots (at least one)
    pub fn new(num_workers: usize) -> Self {
        let workers = (0..num_workers.max(1)).map(|_| WorkerStats::default()).collect();
        Self { workers }
    }

    /// Slot for worker `idx`
    pub fn worker(&self, idx: usize) -> Option<&WorkerStats> {
        self.workers.get(idx)
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Always false; there is at least one slot
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Sum over all workers
    pub fn total(&self) -> StatsSnapshot {
        let mut total = StatsSnapshot::default();
        for worker in &self.workers {
            total.accumulate(&worker.snapshot());
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_stats() {
        let stats = WorkerStats::default();
        stats.record(Action::Allow);
        stats.record(Action::Block);
        stats.record(Action::Unspecified);

        let snap = stats.snapshot();
        assert_eq!(snap.packets, 3);
        assert_eq!(snap.allows, 1);
        assert_eq!(snap.blocks, 1);
        assert_eq!(snap.inspects, 1);
    }

    #[test]
    fn test_aggregate() {
        let stats = BindStats::new(4);
        stats.worker(0).unwrap().record(Action::Allow);
        stats.worker(3).unwrap().record(Action::Allow);
        assert!(stats.worker(4).is_none());

        let total = stats.total();
        assert_eq!(total.packets, 2);
        assert_eq!(total.allows, 2);
    }

    #[test]
    fn test_pegs_order() {
        let snap = StatsSnapshot { packets: 4, blocks: 1, allows: 2, inspects: 1 };
        let names: Vec<_> = snap.pegs().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["packets", "blocks", "allows", "inspects"]);
        assert_eq!(snap.pegs()[2], ("allows", 2));

        let json = serde_json::to_value(snap).unwrap();
        assert_eq!(json["inspects"], 1);
    }

    #[test]
    fn test_zero_workers_gets_one_slot() {
        let stats = BindStats::new(0);
        assert_eq!(stats.len(), 1);
        assert!(!stats.is_empty());
    }

    #[test]
    fn test_slot_alignment() {
        assert_eq!(std::mem::align_of::<WorkerStats>(), 64);
    }
}
