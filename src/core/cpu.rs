use super::state::{Task, TaskId, TaskKind, Ticks};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CpuState {
    Idle,
    Executing,
    IoWait,
    // System-level override, independent of the bound task.
    Overloaded,
}

impl CpuState {
    pub const ALL: [CpuState; 4] = [
        CpuState::Idle,
        CpuState::Executing,
        CpuState::IoWait,
        CpuState::Overloaded,
    ];

    pub const fn for_kind(kind: TaskKind) -> Self {
        match kind {
            TaskKind::Compute => CpuState::Executing,
            TaskKind::Io => CpuState::IoWait,
        }
    }

    pub const fn index(self) -> usize {
        match self {
            CpuState::Idle => 0,
            CpuState::Executing => 1,
            CpuState::IoWait => 2,
            CpuState::Overloaded => 3,
        }
    }
}

impl fmt::Display for CpuState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuState::Idle => f.write_str("IDLE"),
            CpuState::Executing => f.write_str("EXECUTING"),
            CpuState::IoWait => f.write_str("IO_WAIT"),
            CpuState::Overloaded => f.write_str("OVERLOADED"),
        }
    }
}

/// The single execution unit. Holds the bound task by id only; the packet
/// owns the task itself.
#[derive(Debug, Clone)]
pub struct Cpu {
    state: CpuState,
    bound: Option<TaskId>,
    // Previous occupant, used to tell a context switch from a re-grant.
    last_bound: Option<TaskId>,
    quantum_size: Ticks,
    remaining_quantum: Ticks,
    switch_count: u64,
    tick_counter: Ticks,
}

impl Cpu {
    pub fn new(quantum_size: Ticks) -> Self {
        assert!(quantum_size > 0, "CPU quantum must be at least one tick");
        Self {
            state: CpuState::Idle,
            bound: None,
            last_bound: None,
            quantum_size,
            remaining_quantum: 0,
            switch_count: 0,
            tick_counter: 0,
        }
    }

    pub fn state(&self) -> CpuState {
        self.state
    }

    pub fn bound(&self) -> Option<TaskId> {
        self.bound
    }

    pub fn quantum_size(&self) -> Ticks {
        self.quantum_size
    }

    pub fn remaining_quantum(&self) -> Ticks {
        self.remaining_quantum
    }

    pub fn switch_count(&self) -> u64 {
        self.switch_count
    }

    pub fn tick_counter(&self) -> Ticks {
        self.tick_counter
    }

    pub fn is_idle(&self) -> bool {
        self.bound.is_none()
    }

    pub fn quantum_exhausted(&self) -> bool {
        self.remaining_quantum == 0
    }

    /// Grant `task` a fresh quantum. Returns true if this replaced a different
    /// task than the one that last held the CPU (a context switch).
    pub fn bind(&mut self, task: &mut Task) -> bool {
        task.allocate_quantum(self.quantum_size);
        self.remaining_quantum = self.quantum_size;
        self.bound = Some(task.id);
        self.state = CpuState::for_kind(task.kind);

        let switched = matches!(self.last_bound, Some(prev) if prev != task.id);
        if switched {
            self.switch_count += 1;
        }
        self.last_bound = Some(task.id);
        switched
    }

    /// Execute one tick of the bound task. Returns true if the task completed
    /// and was unbound.
    pub fn tick(&mut self, task: Option<&mut Task>) -> bool {
        let Some(bound) = self.bound else {
            self.state = CpuState::Idle;
            return false;
        };
        let task = task.unwrap_or_else(|| panic!("CPU ticked without bound task {bound}"));
        assert_eq!(task.id, bound, "CPU ticked with a task it is not bound to");

        self.tick_counter += 1;
        let completed = task.execute_tick();
        self.remaining_quantum = self.remaining_quantum.saturating_sub(1);

        if completed {
            self.complete();
        }
        completed
    }

    pub fn complete(&mut self) {
        self.bound = None;
        self.state = CpuState::Idle;
        self.remaining_quantum = 0;
    }

    pub(crate) fn set_state(&mut self, state: CpuState) {
        self.state = state;
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.quantum_size);
    }

    pub fn current_task_info(&self, task: Option<&Task>) -> String {
        match task {
            Some(task) if Some(task.id) == self.bound => format!(
                "task {} ({}): {}/{}",
                task.id,
                task.kind,
                task.executed_ticks(),
                task.required_ticks()
            ),
            _ => "no active task".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_sets_state_from_kind() {
        let mut cpu = Cpu::new(2);
        let mut io = Task::new(1, TaskKind::Io, 0);

        cpu.bind(&mut io);
        assert_eq!(cpu.state(), CpuState::IoWait);
        assert_eq!(cpu.bound(), Some(1));
        assert_eq!(cpu.remaining_quantum(), 2);
        assert!(io.is_running());
        assert_eq!(io.remaining_quantum(), 2);
    }

    #[test]
    fn tick_without_task_idles() {
        let mut cpu = Cpu::new(1);
        assert!(!cpu.tick(None));
        assert_eq!(cpu.state(), CpuState::Idle);
        assert_eq!(cpu.tick_counter(), 0);
    }

    #[test]
    fn quantum_runs_out_before_task_finishes() {
        let mut cpu = Cpu::new(1);
        let mut task = Task::new(1, TaskKind::Compute, 0);

        cpu.bind(&mut task);
        assert!(!cpu.tick(Some(&mut task)));
        assert!(cpu.quantum_exhausted());
        assert_eq!(cpu.bound(), Some(1));
        assert_eq!(cpu.tick_counter(), 1);
    }

    #[test]
    fn completion_unbinds() {
        let mut cpu = Cpu::new(5);
        let mut task = Task::new(1, TaskKind::Io, 0);
        cpu.bind(&mut task);

        assert!(!cpu.tick(Some(&mut task)));
        assert!(cpu.tick(Some(&mut task)));
        assert!(cpu.is_idle());
        assert_eq!(cpu.state(), CpuState::Idle);
        assert_eq!(cpu.remaining_quantum(), 0);
        assert!(task.is_done());
    }

    #[test]
    fn regranting_same_task_is_not_a_switch() {
        let mut cpu = Cpu::new(1);
        let mut a = Task::new(1, TaskKind::Compute, 0);
        let mut b = Task::new(2, TaskKind::Compute, 0);

        assert!(!cpu.bind(&mut a));
        cpu.tick(Some(&mut a));
        assert!(!cpu.bind(&mut a));
        cpu.tick(Some(&mut a));
        assert!(cpu.bind(&mut b));
        assert_eq!(cpu.switch_count(), 1);
    }

    #[test]
    fn info_describes_bound_task() {
        let mut cpu = Cpu::new(3);
        let mut task = Task::new(9, TaskKind::Compute, 0);
        assert_eq!(cpu.current_task_info(None), "no active task");

        cpu.bind(&mut task);
        cpu.tick(Some(&mut task));
        assert_eq!(cpu.current_task_info(Some(&task)), "task 9 (COMPUTE): 1/3");
    }
}
