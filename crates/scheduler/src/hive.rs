// SPDX-License-Identifier: MIT

//! The Scheduler ("Queen", spec §4.F): turns objectives into task graphs,
//! assigns them via capability/workload/success scoring, and runs the
//! control loop that detects stalls, recovers from agent failure, and
//! reoptimizes. The public surface matches spec §6's `Scheduler/Hive` API.

use std::collections::BTreeMap;
use std::sync::Arc;

use swarm_bus::MessageBus;
use swarm_core::{
    topics, AgentId, Clock, Content, Message, MessageType, Priority, Recipient, SwarmError, SystemClock, Task, TaskId,
    TaskStatus,
};
use swarm_coordinator::dispatch_assignment;
use swarm_store::StateStore;
use tokio_util::sync::CancellationToken;

use crate::batching::topological_batches;
use crate::failure::{backoff_ms, cascade_failure, should_retry, DEFAULT_RETRY_CAP};
use crate::objective::{plan_for, DecompositionCache, DomainStrategy};
use crate::queue::TaskQueue;
use crate::registry::AgentRegistry;
use crate::scoring::{score_candidate, ScoreWeights};
use crate::stall::{is_stalled, DEFAULT_STALL_THRESHOLD_MS};

/// Tunables an embedder wires from `RUNTIME_*` environment variables (spec
/// §6); never read from the environment directly here (§1 non-goal: no
/// CLI/YAML loading in the core).
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub stall_threshold_ms: u64,
    pub retry_cap: u32,
    pub consensus_threshold: f64,
    pub health_tick_ms: u64,
    pub reoptimize_tick_ms: u64,
    pub decomposition_cache_ttl_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            stall_threshold_ms: DEFAULT_STALL_THRESHOLD_MS,
            retry_cap: DEFAULT_RETRY_CAP,
            consensus_threshold: crate::consensus::DEFAULT_CONSENSUS_THRESHOLD,
            health_tick_ms: 5_000,
            reoptimize_tick_ms: 60_000,
            decomposition_cache_ttl_ms: crate::objective::DEFAULT_CACHE_TTL.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    pub total_tasks: usize,
    pub completed: usize,
    pub failed: usize,
    pub in_progress: usize,
    pub stalled_reassignments: u64,
}

/// The Scheduler/Hive (spec §4.F, §6). Holds the in-memory task queue and
/// agent registry (both reconstructible from the store), and owns the
/// decomposition cache.
pub struct Scheduler<C: Clock = SystemClock> {
    id: AgentId,
    bus: MessageBus<C>,
    store: Arc<dyn StateStore>,
    clock: C,
    config: SchedulerConfig,
    queue: TaskQueue,
    agents: AgentRegistry,
    cache: DecompositionCache,
    stalled_reassignments: std::sync::atomic::AtomicU64,
    cancel: CancellationToken,
}

impl Scheduler<SystemClock> {
    pub fn new(id: AgentId, bus: MessageBus<SystemClock>, store: Arc<dyn StateStore>, config: SchedulerConfig) -> Arc<Self> {
        Self::with_clock(id, bus, store, config, SystemClock)
    }
}

impl<C: Clock> Scheduler<C> {
    pub fn with_clock(id: AgentId, bus: MessageBus<C>, store: Arc<dyn StateStore>, config: SchedulerConfig, clock: C) -> Arc<Self> {
        Arc::new(Self {
            id,
            bus,
            store,
            clock,
            cache: DecompositionCache::new(config.decomposition_cache_ttl_ms),
            config,
            queue: TaskQueue::new(),
            agents: AgentRegistry::new(),
            stalled_reassignments: std::sync::atomic::AtomicU64::new(0),
            cancel: CancellationToken::new(),
        })
    }

    /// `initialize(config)` (spec §6): rebuild the in-memory queue from
    /// every task the store currently holds.
    pub fn initialize(&self) -> Result<(), SwarmError> {
        let tasks = self.store.list_tasks()?;
        self.queue.reload(tasks);
        Ok(())
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    /// `submitTask(goal)` (spec §6): decompose the objective by domain
    /// strategy (cached on `hash(description || strategy)`), batch by
    /// dependency order, persist every task, and enqueue it.
    pub fn submit_task(&self, description: &str, strategy_tag: &str, priority: Priority) -> Result<Vec<Task>, SwarmError> {
        let strategy = DomainStrategy::parse(strategy_tag);
        let now = self.clock.epoch_ms();
        let key = DecompositionCache::key(description, strategy);
        let tasks = match self.cache.get(&key, now) {
            Some(cached) => cached,
            None => {
                let planned = plan_for(description, strategy, priority, now);
                self.cache.put(key, planned.clone(), now);
                planned
            }
        };
        // Validate the dependency graph is acyclic before committing it
        // (batches double as the validation pass).
        topological_batches(&tasks)?;
        for task in &tasks {
            self.store.save_task(task.clone())?;
            self.queue.upsert(task.clone(), now);
        }
        Ok(tasks)
    }

    /// `cancelTask(id)` (spec §6).
    pub fn cancel_task(&self, id: &TaskId) -> Result<(), SwarmError> {
        self.queue.set_status(id, TaskStatus::Cancelled)?;
        if let Some(task) = self.queue.get(id) {
            self.store.save_task(task)?;
        }
        Ok(())
    }

    /// `retryTask(id)` (spec §6): invalidates the decomposition cache entry
    /// for this task's own description/strategy pairing (if known) and
    /// creates a fresh task referencing the original (I6).
    pub fn retry_task(&self, id: &TaskId) -> Result<Task, SwarmError> {
        let original = self.queue.get(id).ok_or_else(|| SwarmError::NotFound(format!("task {id} not found")))?;
        if !original.status.is_terminal() {
            return Err(SwarmError::Validation(format!("task {id} is not terminal, cannot retry")));
        }
        let now = self.clock.epoch_ms();
        let retried = original.retry(now);
        self.store.save_task(retried.clone())?;
        self.queue.upsert(retried.clone(), now);
        Ok(retried)
    }

    pub fn get_tasks(&self) -> Vec<Task> {
        self.queue.all()
    }

    /// `getAgents()` (spec §6): every profile the scheduler's candidate
    /// registry currently knows about, offline and unresponsive included --
    /// callers that want only live candidates should filter on
    /// `AgentLifecycle::is_available` themselves, the same way
    /// `best_candidate` does internally.
    pub fn get_agents(&self) -> Vec<swarm_core::AgentProfile> {
        self.agents.all()
    }

    pub fn get_status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.queue.get(id).map(|t| t.status)
    }

    pub fn get_stats(&self) -> SchedulerStats {
        let tasks = self.queue.all();
        SchedulerStats {
            total_tasks: tasks.len(),
            completed: tasks.iter().filter(|t| t.status == TaskStatus::Completed).count(),
            failed: tasks.iter().filter(|t| t.status == TaskStatus::Failed).count(),
            in_progress: tasks.iter().filter(|t| t.status == TaskStatus::InProgress).count(),
            stalled_reassignments: self.stalled_reassignments.load(std::sync::atomic::Ordering::Relaxed),
        }
    }

    /// Assign every `Pending` task whose dependencies are already
    /// satisfied to its best-scoring available candidate and dispatch it
    /// (spec §4.F: the Scheduler itself "scores and assigns agents", not
    /// just the team coordinator). Tasks with no available candidate are
    /// left `Pending` for the next tick.
    pub fn assign_ready(&self) -> Result<Vec<(TaskId, AgentId)>, SwarmError> {
        let completed: std::collections::BTreeSet<TaskId> =
            self.queue.all().into_iter().filter(|t| t.status == TaskStatus::Completed).map(|t| t.id).collect();
        let mut assigned = Vec::new();
        for task in self.queue.all() {
            if !matches!(task.status, TaskStatus::Created | TaskStatus::Pending) || !task.dependencies_satisfied(&completed) {
                continue;
            }
            let Some(agent) = self.best_candidate(&task, None) else { continue };
            self.queue.mutate(&task.id, |t| {
                t.assigned_agents = vec![agent.clone()];
                t.status = TaskStatus::Assigned;
            })?;
            let updated = self.queue.get(&task.id).expect("just mutated");
            self.store.save_task(updated.clone())?;
            dispatch_assignment(&self.bus, self.id.clone(), agent.clone(), &updated, self.clock.epoch_ms())?;
            assigned.push((task.id, agent));
        }
        Ok(assigned)
    }

    /// Record a progress `INFORM` for an in-flight task (spec §4.F "Stall
    /// detection" reads `last_progress_epoch_ms"); an agent's first
    /// progress signal also promotes `Assigned -> InProgress`.
    pub fn record_progress(&self, id: &TaskId, progress: u8, now_epoch_ms: u64) -> Result<(), SwarmError> {
        if matches!(self.queue.get(id).map(|t| t.status), Some(TaskStatus::Assigned)) {
            self.queue.set_status(id, TaskStatus::InProgress)?;
        }
        self.queue.record_progress(id, progress, now_epoch_ms)?;
        if let Some(task) = self.queue.get(id) {
            self.store.save_task(task)?;
        }
        Ok(())
    }

    /// Best-scoring available candidate for `task` among currently
    /// registered agents, excluding `exclude` (the previous assignee, on
    /// reassignment).
    pub fn best_candidate(&self, task: &Task, exclude: Option<&AgentId>) -> Option<AgentId> {
        let weights = ScoreWeights::default();
        self.agents
            .available()
            .into_iter()
            .filter(|p| exclude.map(|e| &p.id != e).unwrap_or(true))
            .max_by(|a, b| {
                let sa = score_candidate(a, task, self.agents.success_rate(&a.id), &weights);
                let sb = score_candidate(b, task, self.agents.success_rate(&b.id), &weights);
                sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|p| p.id)
    }

    /// One reassignment: cancels the stalled assignee and dispatches to the
    /// next best candidate, recording both in a single queue mutation (I1).
    pub fn reassign_stalled(&self, task_id: &TaskId) -> Result<Option<AgentId>, SwarmError> {
        let task = self.queue.get(task_id).ok_or_else(|| SwarmError::NotFound(format!("task {task_id} not found")))?;
        let current = task.assigned_agents.first().cloned();
        let candidate = self.best_candidate(&task, current.as_ref());
        let Some(new_agent) = candidate else { return Ok(None) };

        if let Some(old_agent) = &current {
            let cancel = Message::new(
                self.id.clone(),
                Recipient::Single(old_agent.clone()),
                MessageType::Command,
                Priority::High,
                self.clock.epoch_ms(),
                Content::new(topics::TASK_CANCEL, serde_json::json!({"task_id": task.id})),
            );
            self.bus.send(cancel)?;
        }

        self.queue.mutate(task_id, |t| {
            t.assigned_agents = vec![new_agent.clone()];
            t.status = TaskStatus::Assigned;
        })?;
        dispatch_assignment(&self.bus, self.id.clone(), new_agent.clone(), &task, self.clock.epoch_ms())?;
        self.stalled_reassignments.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(Some(new_agent))
    }

    /// 5s health/progress tick (spec §5): scan in-progress tasks for
    /// stalls and reassign.
    pub fn check_stalls(&self) -> Vec<TaskId> {
        let now = self.clock.epoch_ms();
        let mut reassigned = Vec::new();
        for (task, last_progress) in self.queue.in_progress() {
            if is_stalled(last_progress, now, self.config.stall_threshold_ms) {
                if self.reassign_stalled(&task.id).ok().flatten().is_some() {
                    reassigned.push(task.id);
                }
            }
        }
        reassigned
    }

    /// Agent-level failure (spec §4.F "Failure handling"): reassign every
    /// in-flight task the agent held and mark it offline.
    pub fn handle_agent_failure(&self, agent: &AgentId) -> Vec<TaskId> {
        self.agents.mark_offline(agent);
        let mut reassigned = Vec::new();
        for task in self.queue.all() {
            if task.status == TaskStatus::InProgress || task.status == TaskStatus::Assigned {
                if task.assigned_agents.iter().any(|a| a == agent) {
                    if self.reassign_stalled(&task.id).ok().flatten().is_some() {
                        reassigned.push(task.id);
                    }
                }
            }
        }
        reassigned
    }

    /// Permanently fail a task (retry cap exhausted): cascades to its
    /// dependents (spec §7 "dependent tasks cascaded").
    pub fn fail_permanently(&self, id: &TaskId, cause: &str) -> Result<Vec<TaskId>, SwarmError> {
        self.queue.mutate(id, |t| {
            t.status = TaskStatus::Failed;
            t.metadata.insert("cause_kind".into(), "agent_error".into());
            t.metadata.insert("cause_detail".into(), cause.to_string());
        })?;
        let mut by_id: BTreeMap<TaskId, Task> = self.queue.all().into_iter().map(|t| (t.id.clone(), t)).collect();
        let cascaded = cascade_failure(id, &mut by_id);
        for cid in &cascaded {
            if let Some(t) = by_id.get(cid) {
                self.queue.upsert(t.clone(), self.clock.epoch_ms());
                self.store.save_task(t.clone())?;
            }
        }
        Ok(cascaded)
    }

    /// Decide retry-vs-fail for a task that just failed, applying
    /// exponential back-off by returning the delay the caller should wait
    /// before resubmitting (spec §4.F "Failure handling" / §7 "Transient
    /// I/O ... retried with exponential back-off").
    pub fn retry_or_fail(&self, id: &TaskId) -> Result<RetryDecision, SwarmError> {
        let task = self.queue.get(id).ok_or_else(|| SwarmError::NotFound(format!("task {id} not found")))?;
        if should_retry(&task, self.config.retry_cap) {
            Ok(RetryDecision::RetryAfterMs(backoff_ms(task.retries)))
        } else {
            self.fail_permanently(id, "retry cap exhausted")?;
            Ok(RetryDecision::PermanentlyFailed)
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfterMs(u64),
    PermanentlyFailed,
}

/// Spawns the two independent control-loop ticks (spec §5: "5s tick for
/// health + progress, 60s tick for pattern analysis and strategy
/// reoptimization"), both stopped by the scheduler's own cancellation
/// token on `shutdown()`.
pub fn spawn_control_loop<C: Clock + 'static>(scheduler: Arc<Scheduler<C>>) -> tokio::task::JoinHandle<()> {
    let cancel = scheduler.cancellation_token();
    tokio::spawn(async move {
        let mut health_tick = tokio::time::interval(std::time::Duration::from_millis(scheduler.config.health_tick_ms));
        let mut reoptimize_tick = tokio::time::interval(std::time::Duration::from_millis(scheduler.config.reoptimize_tick_ms));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("scheduler control loop stopping");
                    break;
                }
                _ = health_tick.tick() => {
                    let reassigned = scheduler.check_stalls();
                    if !reassigned.is_empty() {
                        tracing::warn!(count = reassigned.len(), "reassigned stalled tasks");
                    }
                    match scheduler.assign_ready() {
                        Ok(assigned) if !assigned.is_empty() => {
                            tracing::debug!(count = assigned.len(), "assigned ready tasks");
                        }
                        Ok(_) => {}
                        Err(err) => tracing::error!(error = %err, "failed to assign ready tasks"),
                    }
                }
                _ = reoptimize_tick.tick() => {
                    tracing::debug!("pattern analysis / reoptimization tick");
                }
            }
        }
    })
}
