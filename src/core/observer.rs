use super::{
    cpu::CpuState,
    state::{OsCtx, TaskState},
    stats::{CpuStateCounts, TickSample},
};
use rustc_hash::FxHashSet;

/// Checks cross-structure invariants after each tick and appends the tick's
/// sample to the history.
#[derive(Debug, Default)]
pub struct Observer {
    history: Vec<TickSample>,
    cpu_state_counts: CpuStateCounts,
}

impl Observer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, ctx: &OsCtx) -> &TickSample {
        check_invariants(ctx);

        let (compute_active, io_active) = ctx.running_by_kind();
        let cpu_state = ctx.cpu.state();
        let sample = TickSample {
            tick: ctx.now,
            partitions_used: ctx.used_partitions(),
            max_partitions: ctx.max_partitions,
            cpu_state,
            pending: ctx.pending.len(),
            running: compute_active + io_active,
            done: ctx.finished.len(),
            compute_active,
            io_active,
            free_memory_pct: ctx.free_memory_pct(),
            ready_queue_len: ctx.packet.queue_length(),
            efficiency_pct: ctx.rr.efficiency_pct(),
        };

        self.cpu_state_counts.record(cpu_state);
        self.history.push(sample);
        &self.history[self.history.len() - 1]
    }

    pub fn history(&self) -> &[TickSample] {
        &self.history
    }

    pub fn cpu_state_counts(&self) -> CpuStateCounts {
        self.cpu_state_counts
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.cpu_state_counts = CpuStateCounts::default();
    }
}

fn check_invariants(ctx: &OsCtx) {
    if let Some(task_id) = ctx.cpu.bound() {
        debug_assert_eq!(
            ctx.task(task_id).state(),
            TaskState::Running,
            "cpu.bound task {task_id} must be Running"
        );
        debug_assert!(
            !ctx.packet.ready_queue().contains(task_id),
            "Bound task {task_id} must not wait in the ready queue"
        );
    }

    debug_assert!(
        !ctx.is_over_capacity() || ctx.cpu.state() == CpuState::Overloaded,
        "{} partitions used of {} without OVERLOADED",
        ctx.used_partitions(),
        ctx.max_partitions
    );

    let mut seen = FxHashSet::default();
    for task_id in ctx.packet.ready_queue().iter() {
        debug_assert!(seen.insert(task_id), "Task {task_id} queued twice");
        debug_assert!(
            !ctx.task(task_id).is_done(),
            "Finished task {task_id} still in the ready queue"
        );
    }

    for task in ctx.packet.tasks() {
        debug_assert!(
            task.executed_ticks() <= task.required_ticks(),
            "Task {} ran past its required ticks",
            task.id
        );
        debug_assert!(
            task.is_done() || seen.contains(&task.id) || ctx.cpu.bound() == Some(task.id),
            "Runnable task {} unreachable from the ready queue",
            task.id
        );
    }
}
