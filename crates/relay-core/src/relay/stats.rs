//! Process-wide relay counters.

use std::sync::atomic::{AtomicU64, Ordering};

use relay_types::relay::{EndReason, RelayStatsSnapshot};

#[derive(Debug, Default)]
pub struct RelayStats {
    cycles_started: AtomicU64,
    cycles_completed: AtomicU64,
    cycles_cancelled: AtomicU64,
    cycles_failed: AtomicU64,
    deltas_relayed: AtomicU64,
    deltas_dropped: AtomicU64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cycle_started(&self) {
        self.cycles_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cycle_ended(&self, reason: EndReason) {
        let counter = match reason {
            EndReason::Completed => &self.cycles_completed,
            EndReason::Cancelled => &self.cycles_cancelled,
            EndReason::UpstreamFailed | EndReason::IdleTimeout => &self.cycles_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delta_relayed(&self) {
        self.deltas_relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delta_dropped(&self) {
        self.deltas_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters; `active_sessions` comes from the registry.
    pub fn snapshot(&self, active_sessions: usize) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            cycles_started: self.cycles_started.load(Ordering::Relaxed),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_cancelled: self.cycles_cancelled.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            deltas_relayed: self.deltas_relayed.load(Ordering::Relaxed),
            deltas_dropped: self.deltas_dropped.load(Ordering::Relaxed),
            active_sessions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_end_reasons_map_to_counters() {
        let stats = RelayStats::new();
        stats.cycle_started();
        stats.cycle_started();
        stats.cycle_started();
        stats.cycle_ended(EndReason::Completed);
        stats.cycle_ended(EndReason::Cancelled);
        stats.cycle_ended(EndReason::IdleTimeout);
        stats.delta_relayed();
        stats.delta_dropped();

        let snap = stats.snapshot(2);
        assert_eq!(snap.cycles_started, 3);
        assert_eq!(snap.cycles_completed, 1);
        assert_eq!(snap.cycles_cancelled, 1);
        assert_eq!(snap.cycles_failed, 1);
        assert_eq!(snap.deltas_relayed, 1);
        assert_eq!(snap.deltas_dropped, 1);
        assert_eq!(snap.active_sessions, 2);
    }
}
