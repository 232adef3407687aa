use super::{
    cpu::{Cpu, CpuState},
    stats::RoundRobinStats,
};
use crate::packet::Packet;
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, fmt};

pub type TaskId = u64;
pub type Ticks = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskKind {
    #[serde(alias = "MATH")]
    Compute,
    #[serde(alias = "INOUT")]
    Io,
}

impl TaskKind {
    /// Ticks of CPU service a task of this kind needs. Fixed per kind.
    pub const fn required_ticks(self) -> Ticks {
        match self {
            TaskKind::Compute => 3,
            TaskKind::Io => 2,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Compute => f.write_str("COMPUTE"),
            TaskKind::Io => f.write_str("IO"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    Waiting,
    Running,
    Done,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Waiting => f.write_str("waiting"),
            TaskState::Running => f.write_str("running"),
            TaskState::Done => f.write_str("done"),
        }
    }
}

/// A job and its per-tick execution counters.
///
/// `executed_ticks` never exceeds `required_ticks`, and the task is `Done`
/// exactly when the two are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    // Informational footprint in MB; admission is gated by partition count only.
    pub memory: u64,
    state: TaskState,
    executed_ticks: Ticks,
    remaining_quantum: Ticks,
    switch_count: u64,
}

impl Task {
    pub fn new(id: TaskId, kind: TaskKind, memory: u64) -> Self {
        Self {
            id,
            kind,
            memory,
            state: TaskState::Waiting,
            executed_ticks: 0,
            remaining_quantum: 0,
            switch_count: 0,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn required_ticks(&self) -> Ticks {
        self.kind.required_ticks()
    }

    pub fn executed_ticks(&self) -> Ticks {
        self.executed_ticks
    }

    pub fn remaining_quantum(&self) -> Ticks {
        self.remaining_quantum
    }

    pub fn switch_count(&self) -> u64 {
        self.switch_count
    }

    pub fn is_waiting(&self) -> bool {
        self.state == TaskState::Waiting
    }

    pub fn is_running(&self) -> bool {
        self.state == TaskState::Running
    }

    pub fn is_done(&self) -> bool {
        self.state == TaskState::Done
    }

    pub fn allocate_quantum(&mut self, size: Ticks) {
        debug_assert!(size > 0, "Task {} allocated an empty quantum", self.id);
        self.remaining_quantum = size;
        if self.state == TaskState::Waiting {
            self.state = TaskState::Running;
        }
    }

    /// Run one tick of service. Returns true when this tick finished the task.
    ///
    /// Quantum exhaustion is not reported here; the scheduler reads it off the CPU.
    pub fn execute_tick(&mut self) -> bool {
        assert_eq!(
            self.state,
            TaskState::Running,
            "Task {} executed while not Running",
            self.id
        );

        self.remaining_quantum = self.remaining_quantum.saturating_sub(1);
        self.executed_ticks += 1;

        if self.executed_ticks >= self.required_ticks() {
            self.state = TaskState::Done;
            return true;
        }

        false
    }

    pub(crate) fn record_requeue(&mut self) {
        self.switch_count += 1;
    }

    pub fn reset(&mut self) {
        self.state = TaskState::Waiting;
        self.executed_ticks = 0;
        self.remaining_quantum = 0;
        self.switch_count = 0;
    }

    pub fn remaining_ticks(&self) -> Ticks {
        self.required_ticks().saturating_sub(self.executed_ticks)
    }

    pub fn progress_percent(&self) -> f64 {
        (self.executed_ticks as f64 / self.required_ticks() as f64) * 100.0
    }
}

/// Everything the orchestrator mutates during a tick.
#[derive(Debug, Clone)]
pub struct OsCtx {
    pub now: Ticks,
    pub packet: Packet,
    pub cpu: Cpu,
    // One slot per partition; `None` is free
    pub partitions: Vec<Option<TaskId>>,
    // Normally `partitions.len()`; only diverges while capacity is exceeded
    pub max_partitions: usize,
    pub pending: VecDeque<TaskId>,
    pub finished: Vec<TaskId>,
    pub active: Vec<TaskId>,
    pub io_active: Vec<TaskId>,
    // Informational, in MB
    pub memory_mb: u64,
    pub rr: RoundRobinStats,
}

impl OsCtx {
    pub fn new(packet: Packet, partitions: usize, quantum: Ticks, memory_mb: u64) -> Self {
        let pending = packet.ids().collect();
        Self {
            now: 0,
            packet,
            cpu: Cpu::new(quantum),
            partitions: vec![None; partitions],
            max_partitions: partitions,
            pending,
            finished: Vec::new(),
            active: Vec::new(),
            io_active: Vec::new(),
            memory_mb,
            rr: RoundRobinStats::default(),
        }
    }

    pub fn task(&self, task_id: TaskId) -> &Task {
        self.packet
            .task(task_id)
            .unwrap_or_else(|| panic!("Task {task_id} missing from packet"))
    }

    pub fn task_mut(&mut self, task_id: TaskId) -> &mut Task {
        self.packet
            .task_mut(task_id)
            .unwrap_or_else(|| panic!("Task {task_id} missing from packet"))
    }

    pub fn used_partitions(&self) -> usize {
        self.partitions.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn first_free_partition(&self) -> Option<usize> {
        self.partitions.iter().position(Option::is_none)
    }

    pub fn partition_of(&self, task_id: TaskId) -> Option<usize> {
        self.partitions.iter().position(|&slot| slot == Some(task_id))
    }

    pub fn is_over_capacity(&self) -> bool {
        self.used_partitions() > self.max_partitions
    }

    pub fn free_memory_pct(&self) -> f64 {
        let used = self.used_partitions() as f64 / self.max_partitions as f64 * 100.0;
        (100.0 - used).max(0.0)
    }

    pub fn mark_active(&mut self, task_id: TaskId) {
        if !self.active.contains(&task_id) {
            self.active.push(task_id);
        }
        if self.task(task_id).kind == TaskKind::Io && !self.io_active.contains(&task_id) {
            self.io_active.push(task_id);
        }
    }

    pub fn mark_inactive(&mut self, task_id: TaskId) {
        self.active.retain(|&t| t != task_id);
        self.io_active.retain(|&t| t != task_id);
    }

    pub fn mark_finished(&mut self, task_id: TaskId) {
        debug_assert!(
            self.task(task_id).is_done(),
            "Task {task_id} finished without reaching Done"
        );
        self.mark_inactive(task_id);
        self.pending.retain(|&t| t != task_id);
        if !self.finished.contains(&task_id) {
            self.finished.push(task_id);
        }
    }

    /// Active tasks currently Running, as (compute, io).
    pub fn running_by_kind(&self) -> (usize, usize) {
        let compute = self
            .active
            .iter()
            .map(|&t| self.task(t))
            .filter(|t| t.kind == TaskKind::Compute && t.is_running())
            .count();
        let io = self
            .io_active
            .iter()
            .map(|&t| self.task(t))
            .filter(|t| t.is_running())
            .count();
        (compute, io)
    }

    /// CPU display state implied by the active set alone, ignoring overload.
    pub fn derived_cpu_state(&self) -> CpuState {
        match self.running_by_kind() {
            (compute, _) if compute > 0 => CpuState::Executing,
            (_, io) if io > 0 => CpuState::IoWait,
            _ => CpuState::Idle,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
            && self.active.is_empty()
            && self.io_active.is_empty()
            && self
                .partitions
                .iter()
                .flatten()
                .all(|&t| self.task(t).is_done())
    }
}
