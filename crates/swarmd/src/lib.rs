// SPDX-License-Identifier: MIT

//! `swarmd`: the single `Runtime` owner (spec §2 "[ADDED] Workspace
//! layout", §9 "global singleton" redesign note). Constructs one
//! `MessageBus`, one `StateStore`, one `TeamRegistry`, one `Scheduler`, and
//! one `WorkflowEngine` at startup and hands out shared `Arc<...>` handles;
//! no component reaches for a process-wide singleton.

pub mod config;
pub mod exit_code;

use std::sync::Arc;

use swarm_bus::MessageBus;
use swarm_core::{AgentId, SwarmError, SystemClock};
use swarm_coordinator::TeamRegistry;
use swarm_scheduler::{Scheduler, SchedulerConfig};
use swarm_store::{FileStateStore, MemoryStore, StateStore};
use swarm_workflow::{HandlerRegistry, WorkflowEngine};
use tokio_util::sync::CancellationToken;

use crate::config::RuntimeConfig;

/// Every long-lived component the runtime owns, plus the cancellation
/// token that coordinates their shutdown.
pub struct Runtime {
    pub bus: MessageBus<SystemClock>,
    pub store: Arc<dyn StateStore>,
    pub team_registry: Arc<TeamRegistry>,
    pub scheduler: Arc<Scheduler<SystemClock>>,
    pub workflow_engine: Arc<WorkflowEngine<SystemClock>>,
    pub config: RuntimeConfig,
    shutdown: CancellationToken,
}

impl Runtime {
    /// Build every top-level component from `config`. Opens a durable
    /// `FileStateStore` when `config.state_dir` is set, otherwise an
    /// in-memory one (spec §4.B: both implement the same trait, so the
    /// rest of the system is storage-agnostic).
    pub fn start(config: RuntimeConfig) -> Result<Self, SwarmError> {
        let bus = MessageBus::new();
        let store: Arc<dyn StateStore> = match &config.state_dir {
            Some(dir) => Arc::new(FileStateStore::open_with_capacity(dir, config.event_buffer_size)?),
            None => Arc::new(MemoryStore::new()),
        };

        let team_registry = Arc::new(TeamRegistry::new());

        let scheduler_id = AgentId::new("system", "scheduler");
        let scheduler_config = SchedulerConfig {
            stall_threshold_ms: config.stall_threshold_ms,
            consensus_threshold: config.consensus_threshold,
            ..SchedulerConfig::default()
        };
        let scheduler = Scheduler::new(scheduler_id, bus.clone(), Arc::clone(&store), scheduler_config);
        scheduler.initialize()?;

        let workflow_id = AgentId::new("system", "workflow-engine");
        let workflow_engine =
            Arc::new(WorkflowEngine::new(Arc::clone(&store), bus.clone(), HandlerRegistry::new(), workflow_id));

        Ok(Self { bus, store, team_registry, scheduler, workflow_engine, config, shutdown: CancellationToken::new() })
    }

    /// Spawns the scheduler's control loop and returns its join handle; the
    /// caller awaits `shutdown_signal()` and then calls [`Self::shutdown`].
    pub fn spawn_control_loop(&self) -> tokio::task::JoinHandle<()> {
        swarm_scheduler::spawn_control_loop(Arc::clone(&self.scheduler))
    }

    pub fn shutdown_signal(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stops the scheduler's control loop and flushes the store. Per spec
    /// §6 exit codes, a failure here should surface as
    /// [`exit_code::EXIT_STUCK_SHUTDOWN`].
    pub fn shutdown(&self) -> Result<(), SwarmError> {
        self.shutdown.cancel();
        self.scheduler.shutdown();
        self.store.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_with_default_config_uses_memory_store() {
        let runtime = Runtime::start(RuntimeConfig::default()).unwrap();
        assert!(runtime.scheduler.get_tasks().is_empty());
    }

    #[test]
    fn start_with_state_dir_opens_file_store_and_recovers_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let config = RuntimeConfig { state_dir: Some(dir.path().to_path_buf()), ..RuntimeConfig::default() };
        {
            let runtime = Runtime::start(config.clone()).unwrap();
            runtime.scheduler.submit_task("ship it", "auto", swarm_core::Priority::Normal).unwrap();
            runtime.shutdown().unwrap();
        }
        let reopened = Runtime::start(config).unwrap();
        assert!(!reopened.scheduler.get_tasks().is_empty());
    }
}
