// SPDX-License-Identifier: MIT

//! Goal/Task data model and status lattice (spec §3 "Goal / Task").

use crate::agent::AgentId;
use crate::define_id;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

define_id! {
    /// Unique identifier for a task (and, by extension, a goal -- a goal
    /// is simply the root task of a decomposition).
    pub struct TaskId("task_");
}

/// `created -> pending -> assigned -> in_progress -> {completed, failed, cancelled}`.
/// Terminal states never revert (I6); a retry creates a new `TaskId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Created,
    Pending,
    Assigned,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }

    /// Legal forward transitions per the lattice in spec §3. Terminal
    /// states have none -- callers must create a retry task instead (I6).
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Created, Pending)
                | (Pending, Assigned)
                | (Pending, Cancelled)
                | (Assigned, InProgress)
                | (Assigned, Pending) // reassignment bounces back before re-dispatch
                | (Assigned, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Cancelled)
                | (InProgress, Pending) // stalled task reassignment
        )
    }
}

/// Domain tag used by capability matching and strategy scoring (spec §4.E).
pub type TaskType = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    pub task_type: TaskType,
    pub priority: crate::message::Priority,
    pub status: TaskStatus,
    pub dependencies: BTreeSet<TaskId>,
    pub sub_goals: Vec<TaskId>,
    pub constraints: Vec<String>,
    pub required_capabilities: BTreeSet<String>,
    pub assigned_agents: Vec<AgentId>,
    pub deadline_epoch_ms: Option<u64>,
    pub progress: u8,
    pub retries: u32,
    pub metadata: BTreeMap<String, String>,
    /// Set when this task was created by retrying a permanently-stalled
    /// or failed task; points at the original (now-terminal) task (I6).
    pub retry_of: Option<TaskId>,
    pub created_at_epoch_ms: u64,
}

impl Task {
    pub fn new(description: impl Into<String>, task_type: impl Into<String>, created_at_epoch_ms: u64) -> Self {
        Self {
            id: TaskId::new(),
            description: description.into(),
            task_type: task_type.into(),
            priority: crate::message::Priority::Normal,
            status: TaskStatus::Created,
            dependencies: BTreeSet::new(),
            sub_goals: Vec::new(),
            constraints: Vec::new(),
            required_capabilities: BTreeSet::new(),
            assigned_agents: Vec::new(),
            deadline_epoch_ms: None,
            progress: 0,
            retries: 0,
            metadata: BTreeMap::new(),
            retry_of: None,
            created_at_epoch_ms,
        }
    }

    pub fn progress_clamped(&self) -> u8 {
        self.progress.min(100)
    }

    /// Build a fresh retry task referencing this one (I6: terminal states
    /// never revert; re-execution is a new task).
    pub fn retry(&self, created_at_epoch_ms: u64) -> Task {
        let mut next = Task::new(self.description.clone(), self.task_type.clone(), created_at_epoch_ms);
        next.priority = self.priority;
        next.dependencies = self.dependencies.clone();
        next.constraints = self.constraints.clone();
        next.required_capabilities = self.required_capabilities.clone();
        next.retries = self.retries + 1;
        next.retry_of = Some(self.id.clone());
        next.metadata = self.metadata.clone();
        next
    }

    pub fn dependencies_satisfied(&self, completed: &BTreeSet<TaskId>) -> bool {
        self.dependencies.iter().all(|d| completed.contains(d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_status_accepts_no_further_transition() {
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Failed.can_transition_to(TaskStatus::InProgress));
    }

    #[test]
    fn happy_path_lattice_transitions_are_legal() {
        use TaskStatus::*;
        assert!(Created.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Assigned));
        assert!(Assigned.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
    }

    #[test]
    fn retry_creates_new_id_and_links_original() {
        let t = Task::new("do a thing", "generic", 0);
        let r = t.retry(1_000);
        assert_ne!(t.id, r.id);
        assert_eq!(r.retry_of, Some(t.id));
        assert_eq!(r.retries, 1);
    }

    #[test]
    fn dependencies_satisfied_requires_all_completed() {
        let mut t = Task::new("x", "generic", 0);
        let d1 = TaskId::new();
        let d2 = TaskId::new();
        t.dependencies.insert(d1.clone());
        t.dependencies.insert(d2.clone());
        let mut completed = BTreeSet::new();
        completed.insert(d1);
        assert!(!t.dependencies_satisfied(&completed));
        completed.insert(d2);
        assert!(t.dependencies_satisfied(&completed));
    }
}
