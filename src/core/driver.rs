use super::{
    cpu::CpuState,
    event::{EventSink, Notifier, OsEvent},
    observer::Observer,
    state::{OsCtx, TaskId, TaskKind, Ticks},
    stats::{StatsSnapshot, TickSample},
};
use crate::{
    error::{Result, SimError},
    packet::Packet,
};
use tracing::{debug, warn};

// Progress summaries go out for the first few ticks, then every Nth.
const SUMMARY_EARLY_TICKS: Ticks = 5;
const SUMMARY_EVERY: Ticks = 50;

/// The orchestrator. Owns all simulation state and runs the per-tick
/// pipeline: reap, admit, schedule, execute, CPU state, sample.
#[derive(Debug)]
pub struct OsCore {
    pub ctx: OsCtx,
    observer: Observer,
    notifier: Notifier,
}

impl OsCore {
    pub fn new(packet: Packet, partitions: usize, quantum: Ticks, memory_mb: u64) -> Result<Self> {
        if partitions == 0 {
            return Err(SimError::InvalidPartitions(partitions));
        }
        if quantum == 0 {
            return Err(SimError::InvalidQuantum(quantum));
        }
        if packet.is_empty() {
            return Err(SimError::EmptyPacket);
        }

        Ok(Self {
            ctx: OsCtx::new(packet, partitions, quantum, memory_mb),
            observer: Observer::new(),
            notifier: Notifier::default(),
        })
    }

    pub fn set_sink(&mut self, sink: Box<dyn EventSink>) {
        self.notifier.set_sink(sink);
    }

    pub fn take_sink(&mut self) -> Option<Box<dyn EventSink>> {
        self.notifier.take_sink()
    }

    pub fn has_sink(&self) -> bool {
        self.notifier.is_attached()
    }

    /// Forward a free-form line to the sink, if any.
    pub fn notify(&mut self, message: &str) {
        self.notifier.note(message);
    }

    /// Run one full tick. Returns the task that completed during it, if any.
    pub fn run_tick(&mut self) -> Option<TaskId> {
        self.ctx.now += 1;

        self.reap();
        self.admit();
        self.schedule();
        let completed = self.execute();
        self.update_cpu_state();
        let sample = self.observer.observe(&self.ctx);
        debug!(
            tick = sample.tick,
            cpu = %sample.cpu_state,
            used = sample.partitions_used,
            ready = sample.ready_queue_len,
            "tick complete"
        );

        let now = self.ctx.now;
        if now <= SUMMARY_EARLY_TICKS || now % SUMMARY_EVERY == 0 {
            self.notifier.emit(&OsEvent::Summary {
                tick: now,
                finished: self.ctx.finished.len(),
                total: self.ctx.packet.len(),
                used: self.ctx.used_partitions(),
                max: self.ctx.max_partitions,
                running: self.ctx.cpu.bound(),
            });
        }

        completed
    }

    fn reap(&mut self) {
        let freed: Vec<(usize, TaskId)> = self
            .ctx
            .partitions
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.map(|id| (slot, id)))
            .filter(|&(_, id)| self.ctx.task(id).is_done())
            .collect();

        for (slot, task) in freed {
            self.ctx.partitions[slot] = None;
            self.ctx.mark_finished(task);
            self.notifier.emit(&OsEvent::Freed {
                task,
                partition: slot,
            });
        }
    }

    // First-fit by slot index, in pending FIFO order.
    fn admit(&mut self) {
        while let Some(slot) = self.ctx.first_free_partition() {
            let Some(task_id) = self.ctx.pending.pop_front() else {
                break;
            };

            debug_assert!(
                !self.ctx.task(task_id).is_done(),
                "Finished task {task_id} still pending admission"
            );
            self.ctx.partitions[slot] = Some(task_id);
            if self.ctx.cpu.bound() != Some(task_id) {
                self.ctx.packet.register_ready(task_id);
            }
            self.notifier.emit(&OsEvent::Admitted {
                task: task_id,
                kind: self.ctx.task(task_id).kind,
                partition: slot,
            });

            let used = self.ctx.used_partitions();
            let max = self.ctx.max_partitions;
            if used > max {
                warn!(used, max, "partition capacity exceeded");
                self.notifier
                    .emit(&OsEvent::CapacityExceeded { used, max });
            }
        }
    }

    fn schedule(&mut self) {
        let current = self.ctx.cpu.bound();
        let need_switch = match current {
            Some(id) if self.ctx.task(id).is_done() => true,
            Some(_) if self.ctx.cpu.quantum_exhausted() => {
                self.ctx.rr.quantum_exhaustions += 1;
                true
            }
            Some(_) => false,
            None => true,
        };
        if !need_switch {
            return;
        }

        let Some(next) = self.ctx.packet.next_task(current) else {
            if current.is_some_and(|id| self.ctx.task(id).is_done()) {
                self.ctx.cpu.complete();
            }
            if current.is_none() && self.ctx.finished.len() < self.ctx.packet.len() {
                self.notifier.emit(&OsEvent::NoTaskReady);
            }
            return;
        };

        let task = self.ctx.packet.task_mut(next).expect("Selected task missing from packet");
        let kind = task.kind;
        if self.ctx.cpu.bind(task) {
            self.ctx.rr.context_switches += 1;
        }
        self.ctx.mark_active(next);

        let event = if current == Some(next) {
            OsEvent::Regranted { task: next }
        } else {
            OsEvent::Dispatched { task: next, kind }
        };
        self.notifier.emit(&event);
    }

    fn execute(&mut self) -> Option<TaskId> {
        let Some(task_id) = self.ctx.cpu.bound() else {
            self.ctx.cpu.tick(None);
            return None;
        };

        let task = self.ctx.packet.task_mut(task_id);
        let completed = self.ctx.cpu.tick(task);
        let task = self.ctx.task(task_id);
        let kind = task.kind;

        if !completed {
            let event = OsEvent::Progress {
                task: task_id,
                kind,
                executed: task.executed_ticks(),
                required: task.required_ticks(),
                remaining_quantum: self.ctx.cpu.remaining_quantum(),
            };
            self.notifier.emit(&event);
            return None;
        }

        self.ctx.rr.completed_in_quantum += 1;
        self.ctx.mark_finished(task_id);
        if let Some(slot) = self.ctx.partition_of(task_id) {
            self.ctx.partitions[slot] = None;
        }
        self.ctx.packet.remove_task(task_id);
        self.notifier.emit(&OsEvent::Completed {
            task: task_id,
            kind,
        });
        Some(task_id)
    }

    /// Overload wins; otherwise the state follows the active set.
    fn update_cpu_state(&mut self) {
        let target = if self.ctx.is_over_capacity() {
            CpuState::Overloaded
        } else {
            self.ctx.derived_cpu_state()
        };
        self.transition_cpu(target);
    }

    fn transition_cpu(&mut self, to: CpuState) {
        let from = self.ctx.cpu.state();
        if from == to {
            return;
        }

        self.ctx.cpu.set_state(to);
        let (compute_running, io_running) = self.ctx.running_by_kind();
        debug!(%from, %to, "cpu state change");
        self.notifier.emit(&OsEvent::CpuStateChange {
            from,
            to,
            used: self.ctx.used_partitions(),
            max: self.ctx.max_partitions,
            compute_running,
            io_running,
        });
    }

    /// Change the partition count mid-run. Residents that no longer fit go
    /// back to the front of the pending queue in their partition order.
    pub fn resize(&mut self, new_count: usize) -> Result<()> {
        if new_count == 0 {
            return Err(SimError::InvalidPartitions(new_count));
        }

        let old_count = self.ctx.max_partitions;
        let resident: Vec<TaskId> = self.ctx.partitions.iter().flatten().copied().collect();
        let keep = resident.len().min(new_count);

        let mut partitions = vec![None; new_count];
        for (slot, &task_id) in resident[..keep].iter().enumerate() {
            partitions[slot] = Some(task_id);
        }
        for &task_id in resident[keep..].iter().rev() {
            self.ctx.mark_inactive(task_id);
            self.ctx.pending.push_front(task_id);
        }

        self.ctx.partitions = partitions;
        self.ctx.max_partitions = new_count;
        self.notifier.emit(&OsEvent::Resized {
            from: old_count,
            to: new_count,
            returned: resident.len() - keep,
        });

        if self.ctx.is_over_capacity() {
            self.transition_cpu(CpuState::Overloaded);
        } else if self.ctx.cpu.state() == CpuState::Overloaded {
            let target = self.ctx.derived_cpu_state();
            self.transition_cpu(target);
        }
        Ok(())
    }

    /// Return to the state right after construction, keeping the current
    /// partition count.
    pub fn reset(&mut self) {
        let ctx = &mut self.ctx;
        ctx.packet.reset_all();
        ctx.pending = ctx.packet.ids().collect();
        ctx.partitions = vec![None; ctx.max_partitions];
        ctx.finished.clear();
        ctx.active.clear();
        ctx.io_active.clear();
        ctx.cpu.reset();
        ctx.now = 0;
        ctx.rr = Default::default();

        self.observer.clear();
        self.notifier.emit(&OsEvent::Reset);
    }

    pub fn is_complete(&self) -> bool {
        self.ctx.is_complete()
    }

    pub fn now(&self) -> Ticks {
        self.ctx.now
    }

    pub fn packet(&self) -> &Packet {
        &self.ctx.packet
    }

    pub fn cpu_state(&self) -> CpuState {
        self.ctx.cpu.state()
    }

    pub fn history(&self) -> &[TickSample] {
        self.observer.history()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            history: self.observer.history().to_vec(),
            cpu_state_counts: self.observer.cpu_state_counts(),
            round_robin: self.ctx.rr,
        }
    }

    pub fn count_kind(&self, kind: TaskKind) -> usize {
        self.ctx.packet.count_by_kind(kind)
    }
}
