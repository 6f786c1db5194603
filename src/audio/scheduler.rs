//! Deferred work on the audio clock.
//!
//! Tasks are plain data evaluated by the controller on each tick. A task may
//! be owned by a source; releasing that source cancels everything it owns, so
//! a stale callback can never fire against state that has moved on.

use crate::audio::graph::SourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Stop and release the outgoing source once its fade-out finished
    RetireSource(SourceId),
    /// Clear a transient status message
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub deadline: f64,
    pub kind: TaskKind,
    pub owner: Option<SourceId>,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: u64,
    tasks: Vec<ScheduledTask>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, deadline: f64, kind: TaskKind, owner: Option<SourceId>) -> TaskId {
        self.next_id += 1;
        let id = TaskId(self.next_id);
        self.tasks.push(ScheduledTask {
            id,
            deadline,
            kind,
            owner,
        });
        id
    }

    /// Returns true when the task was still pending
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        self.tasks.len() != before
    }

    /// Cancel every task owned by `owner`, returning how many were dropped
    pub fn cancel_owned_by(&mut self, owner: SourceId) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.owner != Some(owner));
        before - self.tasks.len()
    }

    /// Remove and return every task due at `now`, earliest first
    pub fn take_due(&mut self, now: f64) -> Vec<ScheduledTask> {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.tasks).into_iter().partition(|task| task.deadline <= now);
        self.tasks = pending;
        due.sort_by(|a, b| a.deadline.total_cmp(&b.deadline).then(a.id.cmp(&b.id)));
        due
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    pub fn next_deadline(&self) -> Option<f64> {
        self.tasks.iter().map(|task| task.deadline).min_by(|a, b| a.total_cmp(b))
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}
