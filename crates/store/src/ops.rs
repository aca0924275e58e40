// SPDX-License-Identifier: MIT

//! The closed set of durable operations the store can apply. Every public
//! `StateStore` write (`saveWorkflow`, `saveInstance`, `recordEvent`, ...)
//! is modeled as one `StoreOp` appended to the WAL and applied to
//! `MaterializedState`, mirroring the teacher's single `Event` enum that
//! covers every entity kind instead of one WAL format per table.

use serde::{Deserialize, Serialize};
use swarm_core::{
    Event, HumanTask, HumanTaskId, Snapshot, Task, TaskId, Team, TeamId, WorkflowDefId,
    WorkflowDefinition, WorkflowInstance, WorkflowInstanceId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum StoreOp {
    WorkflowSaved { defn: WorkflowDefinition },
    WorkflowDeleted { id: WorkflowDefId },

    InstanceSaved { instance: WorkflowInstance },
    InstanceUpdated { instance: WorkflowInstance },
    InstanceDeleted { id: WorkflowInstanceId },

    SnapshotSaved { snapshot: Snapshot },
    SnapshotsDeleted { instance_id: WorkflowInstanceId, before_epoch_ms: Option<u64> },

    HumanTaskSaved { task: HumanTask },
    HumanTaskUpdated { task: HumanTask },

    /// A domain event recorded via `recordEvent`, attached to an
    /// `instanceId` for later `getEvents`/replay.
    DomainEvent { event: Event },
    EventsDeleted { instance_id: String, before_epoch_ms: Option<u64> },

    TeamSaved { team: Team },
    TeamDeleted { id: TeamId },

    TaskSaved { task: Task },
    TaskDeleted { id: TaskId },
}
