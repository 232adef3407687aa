pub mod round_robin;

use crate::{
    core::{Task, TaskId, TaskKind, TaskState, Ticks},
    error::{Result, SimError},
    sim::Job,
};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use round_robin::RoundRobinQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketShape {
    ComputeHeavy,
    IoHeavy,
    // Compute and IO demand the same total ticks
    Balanced,
    // Same number of Compute and IO tasks
    EqualSplit,
}

impl fmt::Display for PacketShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketShape::ComputeHeavy => f.write_str("compute-heavy"),
            PacketShape::IoHeavy => f.write_str("io-heavy"),
            PacketShape::Balanced => f.write_str("balanced"),
            PacketShape::EqualSplit => f.write_str("equal-split"),
        }
    }
}

/// The job set of one run plus its Round-Robin turn order.
///
/// The packet owns every task's canonical state. Everything else in the
/// simulator refers to tasks by id.
#[derive(Debug, Clone, Default)]
pub struct Packet {
    tasks: Vec<Task>,
    // TaskId --> tasks[index]
    index: FxHashMap<TaskId, usize>,
    ready: RoundRobinQueue,
    shape: Option<PacketShape>,
}

impl Packet {
    pub fn new(tasks: Vec<Task>) -> Result<Self> {
        if tasks.is_empty() {
            return Err(SimError::EmptyPacket);
        }

        let mut packet = Self::default();
        for task in tasks {
            packet.add_task(task)?;
        }
        Ok(packet)
    }

    pub fn from_jobs(jobs: impl IntoIterator<Item = Job>) -> Result<Self> {
        Self::new(jobs.into_iter().map(Job::into_task).collect())
    }

    /// Add a task to the membership list and the tail of the ready queue.
    pub fn add_task(&mut self, task: Task) -> Result<()> {
        if self.index.contains_key(&task.id) {
            return Err(SimError::DuplicateTaskId(task.id));
        }

        self.index.insert(task.id, self.tasks.len());
        self.ready.register(task.id);
        self.tasks.push(task);
        self.shape = self.classify();
        Ok(())
    }

    /// Drop a task from the packet entirely. Not for use while a run is in
    /// progress.
    pub fn remove_task_by_id(&mut self, id: TaskId) -> Result<Task> {
        let pos = self.index.remove(&id).ok_or(SimError::UnknownTask(id))?;
        let task = self.tasks.remove(pos);
        self.ready.remove(id);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        self.shape = self.classify();
        Ok(task)
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.index.get(&id).map(|&i| &self.tasks[i])
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.index.get(&id).map(|&i| &mut self.tasks[i])
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.tasks.iter().map(|t| t.id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn shape(&self) -> Option<PacketShape> {
        self.shape
    }

    pub fn ready_queue(&self) -> &RoundRobinQueue {
        &self.ready
    }

    fn is_done(&self, id: TaskId) -> bool {
        self.task(id).is_none_or(Task::is_done)
    }

    /// Round-Robin selection.
    ///
    /// A still-runnable `current` rejoins the tail before the head is popped,
    /// so when it is the only runnable task it is handed straight back.
    pub fn next_task(&mut self, current: Option<TaskId>) -> Option<TaskId> {
        if let Some(id) = current {
            let task = self
                .task_mut(id)
                .expect("Current task missing from packet");
            if !task.is_done() {
                task.record_requeue();
                self.ready.register(id);
            }
        }

        let Self { tasks, index, ready, .. } = self;
        ready.pop_runnable(|id| index.get(&id).is_none_or(|&i| tasks[i].is_done()))
    }

    /// Put `id` back in line if it is neither queued nor finished. Returns
    /// whether it was added.
    pub fn register_ready(&mut self, id: TaskId) -> bool {
        if self.is_done(id) {
            return false;
        }
        self.ready.register(id)
    }

    pub fn remove_task(&mut self, id: TaskId) {
        self.ready.remove(id);
    }

    pub fn queue_length(&self) -> usize {
        self.ready.runnable_len(|id| self.is_done(id))
    }

    pub fn count_by_state(&self, state: TaskState) -> usize {
        self.tasks.iter().filter(|t| t.state() == state).count()
    }

    pub fn count_by_kind(&self, kind: TaskKind) -> usize {
        self.tasks.iter().filter(|t| t.kind == kind).count()
    }

    pub fn tasks_by_state(&self, state: TaskState) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.state() == state)
    }

    pub fn tasks_by_kind(&self, kind: TaskKind) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.kind == kind)
    }

    pub fn total_required_ticks(&self) -> Ticks {
        self.tasks.iter().map(Task::required_ticks).sum()
    }

    pub fn total_memory(&self) -> u64 {
        self.tasks.iter().map(|t| t.memory).sum()
    }

    /// Return every task to Waiting and re-seed the ready queue in packet order.
    pub fn reset_all(&mut self) {
        for task in &mut self.tasks {
            task.reset();
        }
        self.ready = self.tasks.iter().map(|t| t.id).collect();
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
        self.index.clear();
        self.ready.clear();
        self.shape = None;
    }

    fn classify(&self) -> Option<PacketShape> {
        if self.tasks.is_empty() {
            return None;
        }

        let (mut compute, mut io) = (0usize, 0usize);
        let (mut compute_ticks, mut io_ticks) = (0, 0);
        for task in &self.tasks {
            match task.kind {
                TaskKind::Compute => {
                    compute += 1;
                    compute_ticks += task.required_ticks();
                }
                TaskKind::Io => {
                    io += 1;
                    io_ticks += task.required_ticks();
                }
            }
        }

        let shape = if compute_ticks == io_ticks {
            PacketShape::Balanced
        } else if compute == io {
            PacketShape::EqualSplit
        } else if compute > io {
            PacketShape::ComputeHeavy
        } else {
            PacketShape::IoHeavy
        };
        Some(shape)
    }
}
