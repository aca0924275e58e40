// SPDX-License-Identifier: MIT

//! The scheduler's in-memory task queue (spec §3 "Ownership": "The
//! Scheduler owns ... an in-memory task queue, reconstructible from the
//! store"). Tracks each task plus the timestamp of its last progress
//! update, the input stall detection needs (spec §4.F "Stall detection").

use std::collections::BTreeMap;

use parking_lot::RwLock;
use swarm_core::{SwarmError, Task, TaskId, TaskStatus};

#[derive(Clone)]
struct Entry {
    task: Task,
    last_progress_epoch_ms: u64,
}

/// In-memory mirror of every non-deleted task, reconstructible at startup
/// from `StateStore::list_tasks`.
#[derive(Default)]
pub struct TaskQueue {
    inner: RwLock<BTreeMap<TaskId, Entry>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the queue from every task the store currently holds,
    /// stamping `last_progress_epoch_ms` to each task's own
    /// `created_at_epoch_ms` (the most recent fact we have without a
    /// progress event log to replay here).
    pub fn reload(&self, tasks: Vec<Task>) {
        let mut inner = self.inner.write();
        inner.clear();
        for task in tasks {
            let stamp = task.created_at_epoch_ms;
            inner.insert(task.id.clone(), Entry { task, last_progress_epoch_ms: stamp });
        }
    }

    pub fn upsert(&self, task: Task, now_epoch_ms: u64) {
        let mut inner = self.inner.write();
        inner.insert(task.id.clone(), Entry { task, last_progress_epoch_ms: now_epoch_ms });
    }

    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.inner.read().get(id).map(|e| e.task.clone())
    }

    pub fn all(&self) -> Vec<Task> {
        self.inner.read().values().map(|e| e.task.clone()).collect()
    }

    pub fn in_progress(&self) -> Vec<(Task, u64)> {
        self.inner
            .read()
            .values()
            .filter(|e| e.task.status == TaskStatus::InProgress)
            .map(|e| (e.task.clone(), e.last_progress_epoch_ms))
            .collect()
    }

    /// Record a progress INFORM: bumps the stall clock and clamps progress
    /// into the task itself.
    pub fn record_progress(&self, id: &TaskId, progress: u8, now_epoch_ms: u64) -> Result<(), SwarmError> {
        let mut inner = self.inner.write();
        let entry = inner.get_mut(id).ok_or_else(|| SwarmError::NotFound(format!("task {id} not queued")))?;
        entry.task.progress = progress.min(100);
        entry.last_progress_epoch_ms = now_epoch_ms;
        Ok(())
    }

    pub fn set_status(&self, id: &TaskId, status: TaskStatus) -> Result<(), SwarmError> {
        let mut inner = self.inner.write();
        let entry = inner.get_mut(id).ok_or_else(|| SwarmError::NotFound(format!("task {id} not queued")))?;
        if !entry.task.status.can_transition_to(status) {
            return Err(SwarmError::Validation(format!(
                "task {id}: illegal transition {:?} -> {status:?}",
                entry.task.status
            )));
        }
        entry.task.status = status;
        Ok(())
    }

    pub fn mutate<F: FnOnce(&mut Task)>(&self, id: &TaskId, f: F) -> Result<(), SwarmError> {
        let mut inner = self.inner.write();
        let entry = inner.get_mut(id).ok_or_else(|| SwarmError::NotFound(format!("task {id} not queued")))?;
        f(&mut entry.task);
        Ok(())
    }

    pub fn remove(&self, id: &TaskId) {
        self.inner.write().remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::Task;

    #[test]
    fn record_progress_bumps_stall_clock() {
        let queue = TaskQueue::new();
        let mut task = Task::new("x", "generic", 0);
        task.status = TaskStatus::InProgress;
        let id = task.id.clone();
        queue.upsert(task, 0);
        queue.record_progress(&id, 40, 5_000).unwrap();
        let (_, last) = queue.in_progress().into_iter().find(|(t, _)| t.id == id).unwrap();
        assert_eq!(last, 5_000);
    }

    #[test]
    fn illegal_status_transition_is_rejected() {
        let queue = TaskQueue::new();
        let task = Task::new("x", "generic", 0);
        let id = task.id.clone();
        queue.upsert(task, 0);
        assert!(queue.set_status(&id, TaskStatus::Completed).is_err());
    }
}
