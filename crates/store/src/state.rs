// SPDX-License-Identifier: MIT

//! Materialized state derived purely by folding `StoreOp`s (event sourcing:
//! the ops are facts, this is their derived projection). All handlers here
//! must be idempotent -- applying the same op twice must equal applying it
//! once -- because ops are replayed from the WAL on top of whatever state a
//! snapshot already captured.

use crate::ops::StoreOp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use swarm_core::{Event, HumanTask, Snapshot, Task, Team, WorkflowDefinition, WorkflowInstance};

pub const CURRENT_STATE_VERSION: u32 = 1;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    #[serde(default = "current_version")]
    pub version: u32,
    pub workflows: BTreeMap<String, WorkflowDefinition>,
    pub instances: BTreeMap<String, WorkflowInstance>,
    /// Keyed by `instanceId`, ordered by timestamp within each vec.
    pub snapshots: BTreeMap<String, Vec<Snapshot>>,
    /// Keyed by `instanceId`, ordered by timestamp.
    pub events: BTreeMap<String, Vec<Event>>,
    pub human_tasks: BTreeMap<String, HumanTask>,
    pub teams: BTreeMap<String, Team>,
    pub tasks: BTreeMap<String, Task>,
}

fn current_version() -> u32 {
    CURRENT_STATE_VERSION
}

impl MaterializedState {
    pub fn new() -> Self {
        Self { version: CURRENT_STATE_VERSION, ..Default::default() }
    }

    /// Apply one op. Idempotent: re-applying an already-applied op (same
    /// primary key) is a no-op change in observable state (I3/I4).
    pub fn apply(&mut self, op: &StoreOp) {
        match op {
            StoreOp::WorkflowSaved { defn } => {
                self.workflows.insert(defn.id.as_str().to_string(), defn.clone());
            }
            StoreOp::WorkflowDeleted { id } => {
                self.workflows.remove(id.as_str());
            }

            StoreOp::InstanceSaved { instance } | StoreOp::InstanceUpdated { instance } => {
                self.instances.insert(instance.id.as_str().to_string(), instance.clone());
            }
            StoreOp::InstanceDeleted { id } => {
                self.instances.remove(id.as_str());
            }

            StoreOp::SnapshotSaved { snapshot } => {
                let key = snapshot.instance_id.as_str().to_string();
                let list = self.snapshots.entry(key).or_default();
                if !list.iter().any(|s| s.id == snapshot.id) {
                    list.push(snapshot.clone());
                    list.sort_by_key(|s| s.timestamp_epoch_ms);
                }
            }
            StoreOp::SnapshotsDeleted { instance_id, before_epoch_ms } => {
                if let Some(list) = self.snapshots.get_mut(instance_id.as_str()) {
                    match before_epoch_ms {
                        Some(ts) => list.retain(|s| s.timestamp_epoch_ms >= *ts),
                        None => list.clear(),
                    }
                }
            }

            StoreOp::HumanTaskSaved { task } | StoreOp::HumanTaskUpdated { task } => {
                self.human_tasks.insert(task.id.as_str().to_string(), task.clone());
            }

            StoreOp::DomainEvent { event } => {
                let list = self.events.entry(event.instance_id.clone()).or_default();
                if !list.iter().any(|e| e.id == event.id) {
                    list.push(event.clone());
                    list.sort_by(|a, b| {
                        a.timestamp_epoch_ms
                            .cmp(&b.timestamp_epoch_ms)
                            .then_with(|| a.id.as_str().cmp(b.id.as_str()))
                    });
                }
            }
            StoreOp::EventsDeleted { instance_id, before_epoch_ms } => {
                if let Some(list) = self.events.get_mut(instance_id) {
                    match before_epoch_ms {
                        Some(ts) => list.retain(|e| e.timestamp_epoch_ms >= *ts),
                        None => list.clear(),
                    }
                }
            }

            StoreOp::TeamSaved { team } => {
                self.teams.insert(team.id.as_str().to_string(), team.clone());
            }
            StoreOp::TeamDeleted { id } => {
                self.teams.remove(id.as_str());
            }

            StoreOp::TaskSaved { task } => {
                self.tasks.insert(task.id.as_str().to_string(), task.clone());
            }
            StoreOp::TaskDeleted { id } => {
                self.tasks.remove(id.as_str());
            }
        }
    }

    /// Keep only the `keep_last` newest snapshots per instance (spec §4.B
    /// "Snapshot policy").
    pub fn cleanup_snapshots(&mut self, instance_id: &str, keep_last: usize) {
        if let Some(list) = self.snapshots.get_mut(instance_id) {
            list.sort_by_key(|s| s.timestamp_epoch_ms);
            if list.len() > keep_last {
                let drop_n = list.len() - keep_last;
                list.drain(0..drop_n);
            }
        }
    }
}
