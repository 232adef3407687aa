use super::config::SimConfig;
use crate::{
    core::{EventSink, OsCore, RoundRobinStats, StatsSnapshot, TaskId, TaskKind, Ticks},
    error::{Result, SimError},
    packet::Packet,
};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartitionChange {
    pub tick: Ticks,
    pub from: usize,
    pub to: usize,
}

impl fmt::Display for PartitionChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick {}: {} -> {} partitions", self.tick, self.from, self.to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub ticks: Ticks,
    pub completed: bool,
    pub finished: usize,
    pub total: usize,
    pub round_robin: RoundRobinStats,
}

/// Runs one `OsCore` under a tick budget and keeps the partition-change log.
#[derive(Debug)]
pub struct Sim {
    pub core: OsCore,
    config: SimConfig,
    ticks_run: Ticks,
    partition_changes: Vec<PartitionChange>,
    // (ticks already run, new partition count), applied by `step`
    planned_resizes: Vec<(Ticks, usize)>,
}

impl Sim {
    pub fn new(config: SimConfig, packet: Packet) -> Result<Self> {
        config.validate()?;
        let core = OsCore::new(packet, config.partitions, config.quantum, config.memory_mb)?;
        Ok(Self {
            core,
            config,
            ticks_run: 0,
            partition_changes: Vec::new(),
            planned_resizes: Vec::new(),
        })
    }

    pub fn with_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.core.set_sink(sink);
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn ticks_run(&self) -> Ticks {
        self.ticks_run
    }

    pub fn partition_changes(&self) -> &[PartitionChange] {
        &self.partition_changes
    }

    pub fn is_complete(&self) -> bool {
        self.core.is_complete()
    }

    pub fn budget_exhausted(&self) -> bool {
        self.ticks_run >= self.config.max_ticks
    }

    pub fn is_over(&self) -> bool {
        self.is_complete() || self.budget_exhausted()
    }

    /// Run a single tick unless the run is already over. Returns the task
    /// completed during the tick.
    pub fn step(&mut self) -> Option<Option<TaskId>> {
        if self.is_over() {
            return None;
        }

        let due: Vec<usize> = self
            .planned_resizes
            .iter()
            .filter(|&&(at, _)| at == self.ticks_run)
            .map(|&(_, count)| count)
            .collect();
        for count in due {
            if let Err(err) = self.resize(count) {
                warn!(%err, "planned resize skipped");
            }
        }

        self.ticks_run += 1;
        Some(self.core.run_tick())
    }

    pub fn run(&mut self) -> RunSummary {
        info!(
            tasks = self.core.packet().len(),
            partitions = self.core.ctx.max_partitions,
            quantum = self.config.quantum,
            "simulation started"
        );
        self.report_start();

        while self.step().is_some() {}

        let summary = self.summary();
        info!(
            ticks = summary.ticks,
            completed = summary.completed,
            finished = summary.finished,
            "simulation finished"
        );
        self.report_finish(&summary);
        summary
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            ticks: self.ticks_run,
            completed: self.is_complete(),
            finished: self.core.ctx.finished.len(),
            total: self.core.packet().len(),
            round_robin: self.core.ctx.rr,
        }
    }

    pub fn resize(&mut self, new_count: usize) -> Result<()> {
        let from = self.core.ctx.max_partitions;
        self.core.resize(new_count)?;
        self.partition_changes.push(PartitionChange {
            tick: self.ticks_run,
            from,
            to: new_count,
        });
        Ok(())
    }

    /// Resize to `new_count` partitions once `at_tick` ticks have run.
    pub fn plan_resize(&mut self, at_tick: Ticks, new_count: usize) -> Result<()> {
        if new_count == 0 {
            return Err(SimError::InvalidPartitions(new_count));
        }
        self.planned_resizes.push((at_tick, new_count));
        Ok(())
    }

    /// Back to the configured starting point, including the configured
    /// partition count.
    pub fn reset(&mut self) {
        self.core.ctx.max_partitions = self.config.partitions;
        self.core.reset();
        self.ticks_run = 0;
        self.partition_changes.clear();
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.core.snapshot()
    }

    fn report_start(&mut self) {
        if !self.core.has_sink() {
            return;
        }

        let packet = self.core.packet();
        let shape = packet
            .shape()
            .map_or_else(|| "undetermined".to_string(), |s| s.to_string());
        let lines = [
            "Round-Robin simulation started".to_string(),
            format!(
                "packet memory: {:.1} GB",
                packet.total_memory() as f64 / 1024.0
            ),
            format!("tasks: {}", packet.len()),
            format!("compute tasks: {}", packet.count_by_kind(TaskKind::Compute)),
            format!("io tasks: {}", packet.count_by_kind(TaskKind::Io)),
            format!("partitions: {}", self.core.ctx.max_partitions),
            format!("quantum: {} ticks", self.config.quantum),
            format!("packet shape: {shape}"),
        ];
        for line in &lines {
            self.core.notify(line);
        }
    }

    fn report_finish(&mut self, summary: &RunSummary) {
        if !self.core.has_sink() {
            return;
        }

        let rr = summary.round_robin;
        let mut lines = vec![
            "simulation finished".to_string(),
            format!("ticks run: {}", summary.ticks),
            format!("final partitions: {}", self.core.ctx.max_partitions),
            "round-robin statistics:".to_string(),
            format!("  context switches: {}", rr.context_switches),
            format!("  quantum exhaustions: {}", rr.quantum_exhaustions),
            format!("  completed within quantum: {}", rr.completed_in_quantum),
        ];
        if rr.context_switches > 0 {
            lines.push(format!("  quantum efficiency: {:.1}%", rr.efficiency_pct()));
        }
        if !self.partition_changes.is_empty() {
            lines.push("partition changes:".to_string());
            lines.push(format!(
                "  initial: {} partitions, quantum {} ticks",
                self.config.partitions, self.config.quantum
            ));
            lines.extend(self.partition_changes.iter().map(|c| format!("  {c}")));
        }
        for line in &lines {
            self.core.notify(line);
        }
    }
}
