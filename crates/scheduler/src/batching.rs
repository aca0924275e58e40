// SPDX-License-Identifier: MIT

//! Converts a task dependency set into topologically ordered, parallel-safe
//! batches (spec §4.F "Batching"): batch *n* contains every task whose
//! dependencies are fully satisfied by batches `0..n`.

use std::collections::{BTreeMap, BTreeSet};

use swarm_core::{SwarmError, Task, TaskId};

/// Kahn's algorithm, grouping by dependency depth instead of emitting a
/// single flat order: each returned `Vec<TaskId>` is one batch, safe to
/// dispatch in parallel once every prior batch has completed.
pub fn topological_batches(tasks: &[Task]) -> Result<Vec<Vec<TaskId>>, SwarmError> {
    let ids: BTreeSet<TaskId> = tasks.iter().map(|t| t.id.clone()).collect();
    let mut remaining_deps: BTreeMap<TaskId, BTreeSet<TaskId>> = tasks
        .iter()
        .map(|t| (t.id.clone(), t.dependencies.iter().filter(|d| ids.contains(*d)).cloned().collect()))
        .collect();

    let mut batches = Vec::new();
    let mut placed: BTreeSet<TaskId> = BTreeSet::new();

    while placed.len() < tasks.len() {
        let ready: Vec<TaskId> = remaining_deps
            .iter()
            .filter(|(id, deps)| !placed.contains(*id) && deps.iter().all(|d| placed.contains(d)))
            .map(|(id, _)| id.clone())
            .collect();

        if ready.is_empty() {
            let stuck: Vec<String> = remaining_deps.keys().filter(|id| !placed.contains(*id)).map(|id| id.to_string()).collect();
            return Err(SwarmError::Validation(format!("cyclic task dependency among {stuck:?}")));
        }

        for id in &ready {
            placed.insert(id.clone());
        }
        batches.push(ready);
    }

    Ok(batches)
}

/// Batch estimated duration = `max(task timeouts)` (spec §4.F "Batching").
/// Tasks without a `deadline_epoch_ms` contribute `0` (no stated timeout).
pub fn batch_duration_ms(batch: &[TaskId], tasks_by_id: &BTreeMap<TaskId, Task>, now_epoch_ms: u64) -> u64 {
    batch
        .iter()
        .filter_map(|id| tasks_by_id.get(id))
        .filter_map(|t| t.deadline_epoch_ms)
        .map(|d| d.saturating_sub(now_epoch_ms))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::Task;

    #[test]
    fn independent_tasks_land_in_one_batch() {
        let a = Task::new("a", "generic", 0);
        let b = Task::new("b", "generic", 0);
        let batches = topological_batches(&[a, b]).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[test]
    fn chained_dependencies_split_into_separate_batches() {
        let a = Task::new("a", "generic", 0);
        let mut b = Task::new("b", "generic", 0);
        b.dependencies.insert(a.id.clone());
        let mut c = Task::new("c", "generic", 0);
        c.dependencies.insert(b.id.clone());
        let batches = topological_batches(&[a, b, c]).unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[2].len(), 1);
    }

    #[test]
    fn cyclic_dependency_errors_as_validation() {
        let mut a = Task::new("a", "generic", 0);
        let mut b = Task::new("b", "generic", 0);
        a.dependencies.insert(b.id.clone());
        b.dependencies.insert(a.id.clone());
        let err = topological_batches(&[a, b]).unwrap_err();
        assert!(matches!(err, SwarmError::Validation(_)));
    }

    #[test]
    fn diamond_dependency_batches_by_depth() {
        let a = Task::new("a", "generic", 0);
        let mut b = Task::new("b", "generic", 0);
        b.dependencies.insert(a.id.clone());
        let mut c = Task::new("c", "generic", 0);
        c.dependencies.insert(a.id.clone());
        let mut d = Task::new("d", "generic", 0);
        d.dependencies.insert(b.id.clone());
        d.dependencies.insert(c.id.clone());
        let batches = topological_batches(&[a, b, c, d]).unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[1].len(), 2);
    }
}
