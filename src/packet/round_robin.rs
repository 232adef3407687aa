use crate::core::TaskId;
use std::collections::VecDeque;

/// Turn order for Round-Robin selection. Holds ids only; completion is
/// looked up through the caller's `is_done` predicate.
#[derive(Debug, Clone, Default)]
pub struct RoundRobinQueue {
    tasks: VecDeque<TaskId>,
}

impl RoundRobinQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, task: TaskId) -> bool {
        self.tasks.contains(&task)
    }

    pub fn push_back(&mut self, task: TaskId) {
        debug_assert!(
            !self.contains(task),
            "Task {task} already present in the ready queue"
        );
        self.tasks.push_back(task);
    }

    /// Append `task` unless it is already queued. Returns whether it was added.
    pub fn register(&mut self, task: TaskId) -> bool {
        if self.contains(task) {
            return false;
        }
        self.tasks.push_back(task);
        true
    }

    pub fn remove(&mut self, task: TaskId) {
        self.tasks.retain(|&t| t != task);
    }

    /// Pop the first entry that has not finished, discarding finished entries
    /// on the way.
    pub fn pop_runnable(&mut self, is_done: impl Fn(TaskId) -> bool) -> Option<TaskId> {
        while let Some(&head) = self.tasks.front() {
            if !is_done(head) {
                break;
            }
            self.tasks.pop_front();
        }

        while let Some(task) = self.tasks.pop_front() {
            if !is_done(task) {
                return Some(task);
            }
        }
        None
    }

    pub fn runnable_len(&self, is_done: impl Fn(TaskId) -> bool) -> usize {
        self.tasks.iter().filter(|&&t| !is_done(t)).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.tasks.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}

impl FromIterator<TaskId> for RoundRobinQueue {
    fn from_iter<I: IntoIterator<Item = TaskId>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().collect(),
        }
    }
}
