// SPDX-License-Identifier: MIT

//! Public `StateStore` trait (spec §4.B) plus two implementations:
//! `FileStateStore` (WAL + snapshot + buffered `recordEvent`, durable across
//! restarts) and `MemoryStore` (no filesystem, used by tests and
//! crash-tolerant deployments). Both serialize every mutation through one
//! `parking_lot::Mutex<MaterializedState>`, matching the single-lock
//! discipline in the concurrency design: the guard is held only for the
//! duration of one state transition, never across I/O.

use crate::buffer::{EventBuffer, DEFAULT_CAPACITY};
use crate::migration::MigrationRegistry;
use crate::ops::StoreOp;
use crate::replay::apply_event_to_instance;
use crate::snapshot;
use crate::state::MaterializedState;
use crate::wal::Wal;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use swarm_core::{
    Event, HumanTask, HumanTaskId, Snapshot, SwarmError, Task, TaskId, Team, TeamId, WorkflowDefId,
    WorkflowDefinition, WorkflowInstance, WorkflowInstanceId,
};

pub trait StateStore: Send + Sync {
    fn save_workflow(&self, defn: WorkflowDefinition) -> Result<(), SwarmError>;
    fn get_workflow(&self, id: &WorkflowDefId) -> Result<Option<WorkflowDefinition>, SwarmError>;
    fn delete_workflow(&self, id: &WorkflowDefId) -> Result<(), SwarmError>;
    /// Every stored workflow definition (spec §4.B/§6 `listWorkflows`).
    fn list_workflows(&self) -> Result<Vec<WorkflowDefinition>, SwarmError>;

    fn save_instance(&self, instance: WorkflowInstance) -> Result<(), SwarmError>;
    fn update_instance(&self, instance: WorkflowInstance) -> Result<(), SwarmError>;
    fn get_instance(&self, id: &WorkflowInstanceId) -> Result<Option<WorkflowInstance>, SwarmError>;
    fn delete_instance(&self, id: &WorkflowInstanceId) -> Result<(), SwarmError>;

    fn save_snapshot(&self, snapshot: Snapshot) -> Result<(), SwarmError>;
    fn get_snapshots(&self, instance_id: &WorkflowInstanceId) -> Result<Vec<Snapshot>, SwarmError>;
    /// The snapshot taken at exactly `timestamp_epoch_ms`, if one exists
    /// (spec §4.B `getSnapshot(instanceId, ts)`).
    fn get_snapshot(&self, instance_id: &WorkflowInstanceId, timestamp_epoch_ms: u64) -> Result<Option<Snapshot>, SwarmError>;
    fn get_latest_snapshot(&self, instance_id: &WorkflowInstanceId) -> Result<Option<Snapshot>, SwarmError>;
    fn delete_snapshots_before(&self, instance_id: &WorkflowInstanceId, before_epoch_ms: Option<u64>) -> Result<(), SwarmError>;

    fn save_human_task(&self, task: HumanTask) -> Result<(), SwarmError>;
    fn update_human_task(&self, task: HumanTask) -> Result<(), SwarmError>;
    fn get_human_task(&self, id: &HumanTaskId) -> Result<Option<HumanTask>, SwarmError>;
    /// Every human task, or only those belonging to `instance_id` when given
    /// (spec §4.B/§6 `listHumanTasks(instanceId?)`).
    fn list_human_tasks(&self, instance_id: Option<&WorkflowInstanceId>) -> Result<Vec<HumanTask>, SwarmError>;

    /// Append to the bounded in-memory ring; may trigger a flush to durable
    /// storage if the ring is now full.
    fn record_event(&self, event: Event) -> Result<(), SwarmError>;
    /// Force-flush any buffered events, then return everything recorded
    /// for `instance_id`.
    fn get_events(&self, instance_id: &str) -> Result<Vec<Event>, SwarmError>;
    fn delete_events_before(&self, instance_id: &str, before_epoch_ms: Option<u64>) -> Result<(), SwarmError>;

    fn save_team(&self, team: Team) -> Result<(), SwarmError>;
    fn get_team(&self, id: &TeamId) -> Result<Option<Team>, SwarmError>;
    fn delete_team(&self, id: &TeamId) -> Result<(), SwarmError>;

    fn save_task(&self, task: Task) -> Result<(), SwarmError>;
    fn get_task(&self, id: &TaskId) -> Result<Option<Task>, SwarmError>;
    fn delete_task(&self, id: &TaskId) -> Result<(), SwarmError>;
    /// Every persisted task, for reconstructing the scheduler's in-memory
    /// queue on startup (spec §4.F: "the scheduler owns ... an in-memory
    /// task queue, reconstructible from the store").
    fn list_tasks(&self) -> Result<Vec<Task>, SwarmError>;

    /// Flush any buffered events and release file handles cleanly.
    fn shutdown(&self) -> Result<(), SwarmError>;

    /// `recoverInstance` (spec §4.B "Replay", invariant I4): reconstruct the
    /// authoritative state of one instance. If the instance record is
    /// present, events after its `startedAt` are replayed on top of it;
    /// otherwise the latest snapshot is reified and events after its
    /// timestamp are replayed on top of that. The reconstructed instance is
    /// persisted before it is returned. Fails if neither an instance record
    /// nor a snapshot exists for `id`.
    ///
    /// This is a per-instance operation, distinct from the whole-store WAL
    /// replay `FileStateStore::open_with_capacity` performs on startup.
    fn recover_instance(&self, id: &WorkflowInstanceId) -> Result<WorkflowInstance, SwarmError> {
        let (mut instance, anchor_epoch_ms) = match self.get_instance(id)? {
            Some(existing) => {
                let anchor = existing.started_at_epoch_ms;
                (existing, anchor)
            }
            None => {
                let snapshot = self
                    .get_latest_snapshot(id)?
                    .ok_or_else(|| SwarmError::NotFound(format!("no instance or snapshot to recover for {id}")))?;
                let reified: WorkflowInstance = serde_json::from_value(snapshot.state_blob.clone())
                    .map_err(|e| SwarmError::Fatal(format!("corrupt snapshot for instance {id}: {e}")))?;
                (reified, snapshot.timestamp_epoch_ms)
            }
        };

        let mut events = self.get_events(id.as_str())?;
        events.retain(|e| e.timestamp_epoch_ms > anchor_epoch_ms);
        events.sort_by(|a, b| {
            a.timestamp_epoch_ms.cmp(&b.timestamp_epoch_ms).then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        for event in &events {
            apply_event_to_instance(&mut instance, event);
        }

        self.update_instance(instance.clone())?;
        Ok(instance)
    }
}

/// In-memory implementation: no WAL, no snapshot file. State is lost on
/// process exit. Used by unit tests and embedders that accept that
/// trade-off.
pub struct MemoryStore {
    state: Mutex<MaterializedState>,
    buffer: Mutex<EventBuffer>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { state: Mutex::new(MaterializedState::new()), buffer: Mutex::new(EventBuffer::default()) }
    }

    fn flush_buffer(&self) {
        let drained = self.buffer.lock().drain();
        if drained.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        for event in drained {
            state.apply(&StoreOp::DomainEvent { event });
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for MemoryStore {
    fn save_workflow(&self, defn: WorkflowDefinition) -> Result<(), SwarmError> {
        self.state.lock().apply(&StoreOp::WorkflowSaved { defn });
        Ok(())
    }
    fn get_workflow(&self, id: &WorkflowDefId) -> Result<Option<WorkflowDefinition>, SwarmError> {
        Ok(self.state.lock().workflows.get(id.as_str()).cloned())
    }
    fn delete_workflow(&self, id: &WorkflowDefId) -> Result<(), SwarmError> {
        self.state.lock().apply(&StoreOp::WorkflowDeleted { id: id.clone() });
        Ok(())
    }
    fn list_workflows(&self) -> Result<Vec<WorkflowDefinition>, SwarmError> {
        Ok(self.state.lock().workflows.values().cloned().collect())
    }

    fn save_instance(&self, instance: WorkflowInstance) -> Result<(), SwarmError> {
        self.state.lock().apply(&StoreOp::InstanceSaved { instance });
        Ok(())
    }
    fn update_instance(&self, instance: WorkflowInstance) -> Result<(), SwarmError> {
        self.state.lock().apply(&StoreOp::InstanceUpdated { instance });
        Ok(())
    }
    fn get_instance(&self, id: &WorkflowInstanceId) -> Result<Option<WorkflowInstance>, SwarmError> {
        Ok(self.state.lock().instances.get(id.as_str()).cloned())
    }
    fn delete_instance(&self, id: &WorkflowInstanceId) -> Result<(), SwarmError> {
        self.state.lock().apply(&StoreOp::InstanceDeleted { id: id.clone() });
        Ok(())
    }

    fn save_snapshot(&self, snapshot: Snapshot) -> Result<(), SwarmError> {
        self.state.lock().apply(&StoreOp::SnapshotSaved { snapshot });
        Ok(())
    }
    fn get_snapshots(&self, instance_id: &WorkflowInstanceId) -> Result<Vec<Snapshot>, SwarmError> {
        Ok(self.state.lock().snapshots.get(instance_id.as_str()).cloned().unwrap_or_default())
    }
    fn get_snapshot(&self, instance_id: &WorkflowInstanceId, timestamp_epoch_ms: u64) -> Result<Option<Snapshot>, SwarmError> {
        Ok(self
            .state
            .lock()
            .snapshots
            .get(instance_id.as_str())
            .and_then(|v| v.iter().find(|s| s.timestamp_epoch_ms == timestamp_epoch_ms).cloned()))
    }
    fn get_latest_snapshot(&self, instance_id: &WorkflowInstanceId) -> Result<Option<Snapshot>, SwarmError> {
        Ok(self.state.lock().snapshots.get(instance_id.as_str()).and_then(|v| v.last().cloned()))
    }
    fn delete_snapshots_before(&self, instance_id: &WorkflowInstanceId, before_epoch_ms: Option<u64>) -> Result<(), SwarmError> {
        self.state.lock().apply(&StoreOp::SnapshotsDeleted { instance_id: instance_id.clone(), before_epoch_ms });
        Ok(())
    }

    fn save_human_task(&self, task: HumanTask) -> Result<(), SwarmError> {
        self.state.lock().apply(&StoreOp::HumanTaskSaved { task });
        Ok(())
    }
    fn update_human_task(&self, task: HumanTask) -> Result<(), SwarmError> {
        self.state.lock().apply(&StoreOp::HumanTaskUpdated { task });
        Ok(())
    }
    fn get_human_task(&self, id: &HumanTaskId) -> Result<Option<HumanTask>, SwarmError> {
        Ok(self.state.lock().human_tasks.get(id.as_str()).cloned())
    }
    fn list_human_tasks(&self, instance_id: Option<&WorkflowInstanceId>) -> Result<Vec<HumanTask>, SwarmError> {
        Ok(self
            .state
            .lock()
            .human_tasks
            .values()
            .filter(|t| match instance_id {
                Some(want) => &t.instance_id == want,
                None => true,
            })
            .cloned()
            .collect())
    }

    fn record_event(&self, event: Event) -> Result<(), SwarmError> {
        let full = self.buffer.lock().push(event);
        if full {
            self.flush_buffer();
        }
        Ok(())
    }
    fn get_events(&self, instance_id: &str) -> Result<Vec<Event>, SwarmError> {
        self.flush_buffer();
        Ok(self.state.lock().events.get(instance_id).cloned().unwrap_or_default())
    }
    fn delete_events_before(&self, instance_id: &str, before_epoch_ms: Option<u64>) -> Result<(), SwarmError> {
        self.flush_buffer();
        self.state.lock().apply(&StoreOp::EventsDeleted { instance_id: instance_id.to_string(), before_epoch_ms });
        Ok(())
    }

    fn save_team(&self, team: Team) -> Result<(), SwarmError> {
        self.state.lock().apply(&StoreOp::TeamSaved { team });
        Ok(())
    }
    fn get_team(&self, id: &TeamId) -> Result<Option<Team>, SwarmError> {
        Ok(self.state.lock().teams.get(id.as_str()).cloned())
    }
    fn delete_team(&self, id: &TeamId) -> Result<(), SwarmError> {
        self.state.lock().apply(&StoreOp::TeamDeleted { id: id.clone() });
        Ok(())
    }

    fn save_task(&self, task: Task) -> Result<(), SwarmError> {
        self.state.lock().apply(&StoreOp::TaskSaved { task });
        Ok(())
    }
    fn get_task(&self, id: &TaskId) -> Result<Option<Task>, SwarmError> {
        Ok(self.state.lock().tasks.get(id.as_str()).cloned())
    }
    fn delete_task(&self, id: &TaskId) -> Result<(), SwarmError> {
        self.state.lock().apply(&StoreOp::TaskDeleted { id: id.clone() });
        Ok(())
    }
    fn list_tasks(&self) -> Result<Vec<Task>, SwarmError> {
        Ok(self.state.lock().tasks.values().cloned().collect())
    }

    fn shutdown(&self) -> Result<(), SwarmError> {
        self.flush_buffer();
        Ok(())
    }
}

/// WAL + snapshot backed implementation. Every mutation is appended to the
/// WAL (and flushed) before it is applied to `MaterializedState`, so a
/// crash between the two leaves the WAL as the source of truth on restart.
pub struct FileStateStore {
    state: Mutex<MaterializedState>,
    wal: Mutex<Wal>,
    buffer: Mutex<EventBuffer>,
    snapshot_path: PathBuf,
}

impl FileStateStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SwarmError> {
        Self::open_with_capacity(dir, DEFAULT_CAPACITY)
    }

    /// Same recovery path as [`Self::open`], with the event ring sized to
    /// `capacity` instead of [`DEFAULT_CAPACITY`] (spec §6
    /// `RUNTIME_EVENT_BUFFER_SIZE`).
    pub fn open_with_capacity(dir: impl AsRef<Path>, capacity: usize) -> Result<Self, SwarmError> {
        let dir = dir.as_ref();
        let wal_path = dir.join("swarm.wal");
        let snapshot_path = dir.join("swarm.snapshot.json");

        let (state, processed_seq) = match snapshot::load(&snapshot_path)
            .map_err(|e| SwarmError::TransientIo(e.to_string()))?
        {
            Some(file) => {
                let migrated = MigrationRegistry::new()
                    .migrate_to(serde_json::to_value(&file.state).map_err(|e| SwarmError::Fatal(e.to_string()))?, MaterializedState::new().version)
                    .map_err(|e| SwarmError::Fatal(e.to_string()))?;
                let state: MaterializedState =
                    serde_json::from_value(migrated).map_err(|e| SwarmError::Fatal(e.to_string()))?;
                (state, file.seq)
            }
            None => (MaterializedState::new(), 0),
        };

        let wal = Wal::open(&wal_path, processed_seq).map_err(|e| SwarmError::TransientIo(e.to_string()))?;
        let mut state = state;
        for entry in wal.entries_after(processed_seq).map_err(|e| SwarmError::TransientIo(e.to_string()))? {
            state.apply(&entry.op);
        }

        Ok(Self {
            state: Mutex::new(state),
            wal: Mutex::new(wal),
            buffer: Mutex::new(EventBuffer::new(capacity)),
            snapshot_path,
        })
    }

    fn apply_durably(&self, op: StoreOp) -> Result<(), SwarmError> {
        let seq = {
            let mut wal = self.wal.lock();
            let seq = wal.append(&op).map_err(|e| SwarmError::TransientIo(e.to_string()))?;
            wal.flush().map_err(|e| SwarmError::TransientIo(e.to_string()))?;
            seq
        };
        self.state.lock().apply(&op);
        self.wal.lock().mark_processed(seq);
        Ok(())
    }

    /// Persist the full current state to `snapshot_path` at the WAL's
    /// last-processed seq, for faster recovery (spec §4.B snapshot policy).
    pub fn take_snapshot(&self, created_at_epoch_ms: u64) -> Result<(), SwarmError> {
        let state = self.state.lock().clone();
        let seq = self.wal.lock().processed_seq();
        snapshot::save(&self.snapshot_path, &state, seq, created_at_epoch_ms)
            .map_err(|e| SwarmError::TransientIo(e.to_string()))
    }

    fn flush_buffer(&self) -> Result<(), SwarmError> {
        let drained = self.buffer.lock().drain();
        if drained.is_empty() {
            return Ok(());
        }
        for event in drained.clone() {
            if let Err(e) = self.apply_durably(StoreOp::DomainEvent { event }) {
                self.buffer.lock().prepend_back(drained);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Force a flush of buffered events outside of a read/write call,
    /// driven by the embedder's own `RUNTIME_EVENT_FLUSH_MS` timer (spec
    /// §4.B: "a flush is triggered ... on a periodic timer, driven by the
    /// owning store").
    pub fn flush_events(&self) -> Result<(), SwarmError> {
        self.flush_buffer()
    }
}

impl StateStore for FileStateStore {
    fn save_workflow(&self, defn: WorkflowDefinition) -> Result<(), SwarmError> {
        self.apply_durably(StoreOp::WorkflowSaved { defn })
    }
    fn get_workflow(&self, id: &WorkflowDefId) -> Result<Option<WorkflowDefinition>, SwarmError> {
        Ok(self.state.lock().workflows.get(id.as_str()).cloned())
    }
    fn delete_workflow(&self, id: &WorkflowDefId) -> Result<(), SwarmError> {
        self.apply_durably(StoreOp::WorkflowDeleted { id: id.clone() })
    }
    fn list_workflows(&self) -> Result<Vec<WorkflowDefinition>, SwarmError> {
        Ok(self.state.lock().workflows.values().cloned().collect())
    }

    fn save_instance(&self, instance: WorkflowInstance) -> Result<(), SwarmError> {
        self.apply_durably(StoreOp::InstanceSaved { instance })
    }
    fn update_instance(&self, instance: WorkflowInstance) -> Result<(), SwarmError> {
        self.apply_durably(StoreOp::InstanceUpdated { instance })
    }
    fn get_instance(&self, id: &WorkflowInstanceId) -> Result<Option<WorkflowInstance>, SwarmError> {
        Ok(self.state.lock().instances.get(id.as_str()).cloned())
    }
    fn delete_instance(&self, id: &WorkflowInstanceId) -> Result<(), SwarmError> {
        self.apply_durably(StoreOp::InstanceDeleted { id: id.clone() })
    }

    fn save_snapshot(&self, snapshot: Snapshot) -> Result<(), SwarmError> {
        self.apply_durably(StoreOp::SnapshotSaved { snapshot })
    }
    fn get_snapshots(&self, instance_id: &WorkflowInstanceId) -> Result<Vec<Snapshot>, SwarmError> {
        Ok(self.state.lock().snapshots.get(instance_id.as_str()).cloned().unwrap_or_default())
    }
    fn get_snapshot(&self, instance_id: &WorkflowInstanceId, timestamp_epoch_ms: u64) -> Result<Option<Snapshot>, SwarmError> {
        Ok(self
            .state
            .lock()
            .snapshots
            .get(instance_id.as_str())
            .and_then(|v| v.iter().find(|s| s.timestamp_epoch_ms == timestamp_epoch_ms).cloned()))
    }
    fn get_latest_snapshot(&self, instance_id: &WorkflowInstanceId) -> Result<Option<Snapshot>, SwarmError> {
        Ok(self.state.lock().snapshots.get(instance_id.as_str()).and_then(|v| v.last().cloned()))
    }
    fn delete_snapshots_before(&self, instance_id: &WorkflowInstanceId, before_epoch_ms: Option<u64>) -> Result<(), SwarmError> {
        self.apply_durably(StoreOp::SnapshotsDeleted { instance_id: instance_id.clone(), before_epoch_ms })
    }

    fn save_human_task(&self, task: HumanTask) -> Result<(), SwarmError> {
        self.apply_durably(StoreOp::HumanTaskSaved { task })
    }
    fn update_human_task(&self, task: HumanTask) -> Result<(), SwarmError> {
        self.apply_durably(StoreOp::HumanTaskUpdated { task })
    }
    fn get_human_task(&self, id: &HumanTaskId) -> Result<Option<HumanTask>, SwarmError> {
        Ok(self.state.lock().human_tasks.get(id.as_str()).cloned())
    }
    fn list_human_tasks(&self, instance_id: Option<&WorkflowInstanceId>) -> Result<Vec<HumanTask>, SwarmError> {
        Ok(self
            .state
            .lock()
            .human_tasks
            .values()
            .filter(|t| match instance_id {
                Some(want) => &t.instance_id == want,
                None => true,
            })
            .cloned()
            .collect())
    }

    fn record_event(&self, event: Event) -> Result<(), SwarmError> {
        let full = self.buffer.lock().push(event);
        if full {
            self.flush_buffer()?;
        }
        Ok(())
    }
    fn get_events(&self, instance_id: &str) -> Result<Vec<Event>, SwarmError> {
        self.flush_buffer()?;
        Ok(self.state.lock().events.get(instance_id).cloned().unwrap_or_default())
    }
    fn delete_events_before(&self, instance_id: &str, before_epoch_ms: Option<u64>) -> Result<(), SwarmError> {
        self.flush_buffer()?;
        self.apply_durably(StoreOp::EventsDeleted { instance_id: instance_id.to_string(), before_epoch_ms })
    }

    fn save_team(&self, team: Team) -> Result<(), SwarmError> {
        self.apply_durably(StoreOp::TeamSaved { team })
    }
    fn get_team(&self, id: &TeamId) -> Result<Option<Team>, SwarmError> {
        Ok(self.state.lock().teams.get(id.as_str()).cloned())
    }
    fn delete_team(&self, id: &TeamId) -> Result<(), SwarmError> {
        self.apply_durably(StoreOp::TeamDeleted { id: id.clone() })
    }

    fn save_task(&self, task: Task) -> Result<(), SwarmError> {
        self.apply_durably(StoreOp::TaskSaved { task })
    }
    fn get_task(&self, id: &TaskId) -> Result<Option<Task>, SwarmError> {
        Ok(self.state.lock().tasks.get(id.as_str()).cloned())
    }
    fn delete_task(&self, id: &TaskId) -> Result<(), SwarmError> {
        self.apply_durably(StoreOp::TaskDeleted { id: id.clone() })
    }
    fn list_tasks(&self) -> Result<Vec<Task>, SwarmError> {
        Ok(self.state.lock().tasks.values().cloned().collect())
    }

    fn shutdown(&self) -> Result<(), SwarmError> {
        self.flush_buffer()
    }
}
