// SPDX-License-Identifier: MIT

//! Failure handling (spec §4.F "Failure handling" / §7 "Error handling
//! design"): per-task retry cap with exponential back-off, and cascading a
//! permanently failed task's status to its dependents with a cause chain.

use std::collections::BTreeMap;

use swarm_core::{Task, TaskId, TaskStatus};

/// Default per-task retry cap (spec §4.F: "default 3").
pub const DEFAULT_RETRY_CAP: u32 = 3;

pub fn should_retry(task: &Task, cap: u32) -> bool {
    task.retries < cap
}

/// Exponential back-off: `1s * 2^attempt`, capped at 5 minutes.
pub fn backoff_ms(attempt: u32) -> u64 {
    const BASE_MS: u64 = 1_000;
    const CAP_MS: u64 = 5 * 60 * 1_000;
    BASE_MS.saturating_mul(1u64 << attempt.min(20)).min(CAP_MS)
}

/// Transition every (transitive) dependent of `root` to `failed`, stamping
/// a cause chain in `metadata` (spec §7: "dependent tasks cascaded"), and
/// return the cascaded ids. Tasks already terminal are left untouched
/// (I6).
pub fn cascade_failure(root: &TaskId, tasks: &mut BTreeMap<TaskId, Task>) -> Vec<TaskId> {
    let mut cascaded = Vec::new();
    let mut frontier = vec![root.clone()];
    while let Some(id) = frontier.pop() {
        let dependents: Vec<TaskId> =
            tasks.iter().filter(|(_, t)| !t.status.is_terminal() && t.dependencies.contains(&id)).map(|(tid, _)| tid.clone()).collect();
        for dep in dependents {
            if let Some(t) = tasks.get_mut(&dep) {
                t.status = TaskStatus::Failed;
                t.metadata.insert("cause_kind".into(), "cascaded".into());
                t.metadata.insert("cause_task".into(), id.to_string());
            }
            cascaded.push(dep.clone());
            frontier.push(dep);
        }
    }
    cascaded
}
