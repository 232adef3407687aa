use super::{cpu::CpuState, state::Ticks};
use average::{Estimate, Mean};
use serde::{Deserialize, Serialize};

/// One fixed-width row of the per-tick time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSample {
    pub tick: Ticks,
    pub partitions_used: usize,
    pub max_partitions: usize,
    pub cpu_state: CpuState,
    pub pending: usize,
    pub running: usize,
    pub done: usize,
    pub compute_active: usize,
    pub io_active: usize,
    pub free_memory_pct: f64,
    pub ready_queue_len: usize,
    pub efficiency_pct: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRobinStats {
    pub context_switches: u64,
    pub quantum_exhaustions: u64,
    pub completed_in_quantum: u64,
}

impl RoundRobinStats {
    /// Completions per context switch, as a percentage.
    pub fn efficiency_pct(&self) -> f64 {
        self.completed_in_quantum as f64 / self.context_switches.max(1) as f64 * 100.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuStateCounts([u64; 4]);

impl CpuStateCounts {
    pub fn record(&mut self, state: CpuState) {
        self.0[state.index()] += 1;
    }

    pub fn get(&self, state: CpuState) -> u64 {
        self.0[state.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (CpuState, u64)> + '_ {
        CpuState::ALL.into_iter().map(|s| (s, self.get(s)))
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }
}

/// Point-in-time copy of everything the reporting layer reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub history: Vec<TickSample>,
    pub cpu_state_counts: CpuStateCounts,
    pub round_robin: RoundRobinStats,
}

impl StatsSnapshot {
    pub fn ticks(&self) -> usize {
        self.history.len()
    }

    pub fn last(&self) -> Option<&TickSample> {
        self.history.last()
    }

    pub fn mean_free_memory_pct(&self) -> f64 {
        self.history
            .iter()
            .map(|s| s.free_memory_pct)
            .collect::<Mean>()
            .estimate()
    }

    pub fn mean_ready_queue_len(&self) -> f64 {
        self.history
            .iter()
            .map(|s| s.ready_queue_len as f64)
            .collect::<Mean>()
            .estimate()
    }

    pub fn peak_partitions_used(&self) -> usize {
        self.history
            .iter()
            .map(|s| s.partitions_used)
            .max()
            .unwrap_or(0)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(tick: Ticks, used: usize, free: f64, queue: usize) -> TickSample {
        TickSample {
            tick,
            partitions_used: used,
            max_partitions: 2,
            cpu_state: CpuState::Executing,
            pending: 0,
            running: 1,
            done: 0,
            compute_active: 1,
            io_active: 0,
            free_memory_pct: free,
            ready_queue_len: queue,
            efficiency_pct: 0.0,
        }
    }

    #[test]
    fn efficiency_guards_zero_switches() {
        let stats = RoundRobinStats {
            context_switches: 0,
            quantum_exhaustions: 0,
            completed_in_quantum: 1,
        };
        assert_eq!(stats.efficiency_pct(), 100.0);

        let stats = RoundRobinStats {
            context_switches: 4,
            ..stats
        };
        assert_eq!(stats.efficiency_pct(), 25.0);
    }

    #[test]
    fn summary_means() {
        let snapshot = StatsSnapshot {
            history: vec![sample(1, 2, 0.0, 3), sample(2, 1, 50.0, 1)],
            cpu_state_counts: CpuStateCounts::default(),
            round_robin: RoundRobinStats::default(),
        };

        assert_eq!(snapshot.ticks(), 2);
        assert_eq!(snapshot.mean_free_memory_pct(), 25.0);
        assert_eq!(snapshot.mean_ready_queue_len(), 2.0);
        assert_eq!(snapshot.peak_partitions_used(), 2);
        assert_eq!(snapshot.last().map(|s| s.tick), Some(2));
    }

    #[test]
    fn snapshot_exports_json() {
        let mut counts = CpuStateCounts::default();
        counts.record(CpuState::Idle);
        counts.record(CpuState::Overloaded);
        let snapshot = StatsSnapshot {
            history: vec![sample(1, 1, 50.0, 0)],
            cpu_state_counts: counts,
            round_robin: RoundRobinStats::default(),
        };

        let json = snapshot.to_json().unwrap();
        let back: StatsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
        assert_eq!(counts.total(), 2);
        assert_eq!(counts.get(CpuState::Overloaded), 1);
    }
}
