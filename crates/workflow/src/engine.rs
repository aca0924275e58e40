// SPDX-License-Identifier: MIT

//! The workflow interpreter proper (spec §4.G): drives a `WorkflowInstance`
//! node by node, checkpointing a `Snapshot` after every transition so a
//! crash mid-run resumes by loading the latest snapshot and replaying
//! events recorded since (mirrors `swarm-store`'s own WAL+snapshot split,
//! one level up).

use crate::expr::evaluate_condition;
use crate::handlers::HandlerRegistry;
use crate::interpreter::{aggregate_merge, join_node, loop_body_edge, loop_exit_edge, select_next_edge};
use crate::validate::validate_definition;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use swarm_bus::MessageBus;
use swarm_core::{
    AgentId, Clock, Content, Event, HumanTask, HumanTaskId, HumanTaskStatus, InstanceStatus,
    MessageType, Node, NodeKind, Priority, Recipient, Snapshot, SwarmError, SystemClock, Task,
    WorkflowContext, WorkflowDefId, WorkflowDefinition, WorkflowInstance, WorkflowInstanceId,
};
use swarm_store::{apply_event_to_instance, StateStore};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Bound on a `Task` node's request/response round trip (spec §4.C
    /// "every `sendAndWaitForResponse` carries a mandatory timeout").
    pub task_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { task_timeout_ms: 30_000 }
    }
}

/// What running an instance to its next stopping point produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed(String),
    Cancelled,
    Paused,
    WaitingOnHumanTask(HumanTaskId),
    WaitingOnEvent(String),
}

pub struct WorkflowEngine<C: Clock = SystemClock> {
    store: Arc<dyn StateStore>,
    bus: MessageBus<C>,
    handlers: HandlerRegistry,
    clock: C,
    id: AgentId,
    config: EngineConfig,
    /// One cancellation signal per live instance, checked from inside a
    /// `Task` node's in-flight bus wait (spec §4.G `pauseWorkflow`: "on
    /// pause, a snapshot is taken synchronously and the interpreter is
    /// stopped"). Replaced with a fresh token on resume.
    pause_tokens: Mutex<HashMap<WorkflowInstanceId, CancellationToken>>,
}

impl WorkflowEngine<SystemClock> {
    pub fn new(store: Arc<dyn StateStore>, bus: MessageBus<SystemClock>, handlers: HandlerRegistry, id: AgentId) -> Self {
        Self::with_clock(store, bus, handlers, SystemClock, id, EngineConfig::default())
    }
}

/// A child-workflow invocation (`Subworkflow` nodes) recurses through
/// `start` -> `run` -> `execute_node` -> `execute_subworkflow` -> `start`.
/// `async fn` sugar can't express that cycle (the compiler would need a
/// self-referential state machine), so `start` and `execute_node` -- the two
/// functions where the recursion actually closes -- return a manually boxed
/// future instead; everything they call in turn stays a plain `async fn`.
type StartFuture<'a> = Pin<Box<dyn Future<Output = Result<(WorkflowInstanceId, RunOutcome), SwarmError>> + Send + 'a>>;
type NodeFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<String>, SuspendOrFail>> + Send + 'a>>;

impl<C: Clock> WorkflowEngine<C> {
    pub fn with_clock(
        store: Arc<dyn StateStore>,
        bus: MessageBus<C>,
        handlers: HandlerRegistry,
        clock: C,
        id: AgentId,
        config: EngineConfig,
    ) -> Self {
        Self { store, bus, handlers, clock, id, config, pause_tokens: Mutex::new(HashMap::new()) }
    }

    fn pause_token(&self, instance_id: &WorkflowInstanceId) -> CancellationToken {
        self.pause_tokens.lock().entry(instance_id.clone()).or_insert_with(CancellationToken::new).clone()
    }

    /// Requests that `instance_id` stop at the next point its interpreter
    /// checks for a pause signal (currently: mid-wait on a `Task` node's
    /// response). Idempotent; has no effect on an instance with no
    /// in-flight `run`.
    pub fn pause_workflow(&self, instance_id: &WorkflowInstanceId) -> Result<(), SwarmError> {
        self.pause_token(instance_id).cancel();
        Ok(())
    }

    /// Clears the pause signal and continues `instance_id` from the node it
    /// was paused on (spec §4.G "Resume"): the latest snapshot is loaded
    /// (failing if none exists), events recorded after it are replayed on
    /// top, and only then does the interpreter continue -- honoring I4 the
    /// same way `StateStore::recover_instance` does.
    pub async fn resume_workflow(&self, instance_id: &WorkflowInstanceId) -> Result<RunOutcome, SwarmError> {
        self.pause_tokens.lock().insert(instance_id.clone(), CancellationToken::new());
        let instance = self
            .store
            .get_instance(instance_id)?
            .ok_or_else(|| SwarmError::NotFound(format!("workflow instance {instance_id} not found")))?;
        if instance.status != InstanceStatus::Paused {
            return Err(SwarmError::Validation(format!("instance {instance_id} is not paused")));
        }

        let snapshot = self
            .store
            .get_latest_snapshot(instance_id)?
            .ok_or_else(|| SwarmError::Validation(format!("instance {instance_id} has no snapshot to resume from")))?;
        let mut restored: WorkflowInstance = serde_json::from_value(snapshot.state_blob.clone())
            .map_err(|e| SwarmError::Fatal(format!("corrupt snapshot for instance {instance_id}: {e}")))?;

        let mut events = self.store.get_events(instance_id.as_str())?;
        events.retain(|e| e.timestamp_epoch_ms > snapshot.timestamp_epoch_ms);
        events.sort_by(|a, b| {
            a.timestamp_epoch_ms.cmp(&b.timestamp_epoch_ms).then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        for event in &events {
            apply_event_to_instance(&mut restored, event);
        }

        restored.status = InstanceStatus::Running;
        self.store.update_instance(restored)?;
        self.run(instance_id).await
    }

    /// Marks `instance_id` cancelled; `reason` is recorded on the instance
    /// and in the event log. Refuses an already-terminal instance.
    pub fn cancel_workflow(&self, instance_id: &WorkflowInstanceId, reason: Option<&str>) -> Result<RunOutcome, SwarmError> {
        let mut instance = self
            .store
            .get_instance(instance_id)?
            .ok_or_else(|| SwarmError::NotFound(format!("workflow instance {instance_id} not found")))?;
        if matches!(instance.status, InstanceStatus::Completed | InstanceStatus::Failed | InstanceStatus::Cancelled) {
            return Err(SwarmError::Validation(format!("instance {instance_id} is already terminal")));
        }
        instance.status = InstanceStatus::Cancelled;
        instance.error = reason.map(str::to_string);
        instance.completed_at_epoch_ms = Some(self.clock.epoch_ms());
        self.record_event(&instance, "workflow.cancelled", serde_json::json!({"reason": reason}))?;
        self.checkpoint(&mut instance)?;
        Ok(RunOutcome::Cancelled)
    }

    pub fn get_workflow_status(&self, instance_id: &WorkflowInstanceId) -> Result<InstanceStatus, SwarmError> {
        self.store
            .get_instance(instance_id)?
            .map(|i| i.status)
            .ok_or_else(|| SwarmError::NotFound(format!("workflow instance {instance_id} not found")))
    }

    /// Validates `def`, persists a fresh `Pending` instance, and returns its
    /// id without running it -- lets a caller learn the id before the first
    /// node executes (spec §4.G `startWorkflow` itself just chains this with
    /// [`Self::run`]).
    pub fn create_instance(
        &self,
        def: WorkflowDefinition,
        inputs: std::collections::BTreeMap<String, serde_json::Value>,
        parent: Option<WorkflowInstanceId>,
    ) -> Result<WorkflowInstanceId, SwarmError> {
        validate_definition(&def)?;
        let start_node = def
            .start_nodes()
            .first()
            .map(|n| n.id.clone())
            .ok_or_else(|| SwarmError::Validation("workflow has no Start node".into()))?;
        self.store.save_workflow(def.clone())?;

        let mut context = WorkflowContext::default();
        context.inputs = inputs;

        let instance = WorkflowInstance {
            id: WorkflowInstanceId::new(),
            def_id: def.id.clone(),
            status: InstanceStatus::Pending,
            current_node: start_node,
            context,
            human_tasks: Vec::new(),
            started_at_epoch_ms: self.clock.epoch_ms(),
            completed_at_epoch_ms: None,
            parent,
            error: None,
        };
        let instance_id = instance.id.clone();
        self.store.save_instance(instance)?;
        Ok(instance_id)
    }

    /// Registers `def`, creates a fresh `Pending` instance, and runs it to
    /// its first stopping point.
    pub fn start<'a>(
        &'a self,
        def: WorkflowDefinition,
        inputs: std::collections::BTreeMap<String, serde_json::Value>,
        parent: Option<WorkflowInstanceId>,
    ) -> StartFuture<'a> {
        Box::pin(async move {
            let instance_id = self.create_instance(def, inputs, parent)?;
            let outcome = self.run(&instance_id).await?;
            Ok((instance_id, outcome))
        })
    }

    /// Drives `instance_id` from its current node until it completes,
    /// fails, is cancelled, or suspends waiting on a human task or event.
    pub async fn run(&self, instance_id: &WorkflowInstanceId) -> Result<RunOutcome, SwarmError> {
        let mut instance = self
            .store
            .get_instance(instance_id)?
            .ok_or_else(|| SwarmError::NotFound(format!("workflow instance {instance_id} not found")))?;
        let def = self
            .store
            .get_workflow(&instance.def_id)?
            .ok_or_else(|| SwarmError::NotFound(format!("workflow definition {} not found", instance.def_id)))?;

        instance.status = InstanceStatus::Running;

        loop {
            let node = def
                .node(&instance.current_node)
                .ok_or_else(|| SwarmError::Validation(format!("instance references unknown node {}", instance.current_node)))?
                .clone();

            self.record_event(&instance, "node.entered", serde_json::json!({"node_id": node.id}))?;

            match self.execute_node(&node, &mut instance, &def).await {
                Ok(Some(next)) => {
                    instance.current_node = next;
                    self.checkpoint(&mut instance)?;
                }
                Ok(None) => {
                    instance.status = InstanceStatus::Completed;
                    instance.completed_at_epoch_ms = Some(self.clock.epoch_ms());
                    self.checkpoint(&mut instance)?;
                    return Ok(RunOutcome::Completed);
                }
                Err(SuspendOrFail::Suspend(reason)) => {
                    instance.status = match reason {
                        Suspend::Paused => InstanceStatus::Paused,
                        Suspend::HumanTask(_) | Suspend::Event(_) => InstanceStatus::Waiting,
                    };
                    self.checkpoint(&mut instance)?;
                    return Ok(match reason {
                        Suspend::HumanTask(id) => RunOutcome::WaitingOnHumanTask(id),
                        Suspend::Event(kind) => RunOutcome::WaitingOnEvent(kind),
                        Suspend::Paused => RunOutcome::Paused,
                    });
                }
                Err(SuspendOrFail::Fail(reason)) => {
                    instance.status = InstanceStatus::Failed;
                    instance.error = Some(reason.clone());
                    instance.completed_at_epoch_ms = Some(self.clock.epoch_ms());
                    self.checkpoint(&mut instance)?;
                    return Ok(RunOutcome::Failed(reason));
                }
            }
        }
    }

    /// Resumes an instance waiting on a human task: records the response,
    /// advances past the `HumanTask` node, and continues running.
    pub async fn complete_human_task(
        &self,
        instance_id: &WorkflowInstanceId,
        human_task_id: &HumanTaskId,
        response: serde_json::Value,
    ) -> Result<RunOutcome, SwarmError> {
        let mut task = self
            .store
            .get_human_task(human_task_id)?
            .ok_or_else(|| SwarmError::NotFound(format!("human task {human_task_id} not found")))?;
        task.status = HumanTaskStatus::Completed;
        task.response = Some(response.clone());
        self.store.update_human_task(task.clone())?;

        let mut instance = self
            .store
            .get_instance(instance_id)?
            .ok_or_else(|| SwarmError::NotFound(format!("workflow instance {instance_id} not found")))?;
        let def = self
            .store
            .get_workflow(&instance.def_id)?
            .ok_or_else(|| SwarmError::NotFound(format!("workflow definition {} not found", instance.def_id)))?;
        instance.context.node_outputs.insert(task.node_id.clone(), response);
        let next = select_next_edge(&def, &task.node_id, &instance.context, &self.handlers)?;
        match next {
            Some(n) => instance.current_node = n,
            None => {
                instance.status = InstanceStatus::Completed;
                instance.completed_at_epoch_ms = Some(self.clock.epoch_ms());
                self.checkpoint(&mut instance)?;
                return Ok(RunOutcome::Completed);
            }
        }
        self.store.update_instance(instance.clone())?;
        self.run(instance_id).await
    }

    /// Resumes an instance waiting on an external event matching
    /// `event_type`.
    pub async fn complete_event(
        &self,
        instance_id: &WorkflowInstanceId,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<RunOutcome, SwarmError> {
        let mut instance = self
            .store
            .get_instance(instance_id)?
            .ok_or_else(|| SwarmError::NotFound(format!("workflow instance {instance_id} not found")))?;
        let def = self
            .store
            .get_workflow(&instance.def_id)?
            .ok_or_else(|| SwarmError::NotFound(format!("workflow definition {} not found", instance.def_id)))?;
        let node_id = instance.current_node.clone();
        let node = def.node(&node_id).ok_or_else(|| SwarmError::Validation(format!("unknown node {node_id}")))?;
        if !matches!(&node.kind, NodeKind::Event { event_type: expected } if expected == event_type) {
            return Err(SwarmError::Validation(format!("instance is not waiting on event {event_type}")));
        }
        instance.context.node_outputs.insert(node_id.clone(), payload);
        let next = select_next_edge(&def, &node_id, &instance.context, &self.handlers)?;
        match next {
            Some(n) => instance.current_node = n,
            None => {
                instance.status = InstanceStatus::Completed;
                instance.completed_at_epoch_ms = Some(self.clock.epoch_ms());
                self.checkpoint(&mut instance)?;
                return Ok(RunOutcome::Completed);
            }
        }
        self.store.update_instance(instance.clone())?;
        self.run(instance_id).await
    }

    /// Executes one node's side effect, returning the next node id (`None`
    /// at an `End` node).
    fn execute_node<'a>(
        &'a self,
        node: &'a Node,
        instance: &'a mut WorkflowInstance,
        def: &'a WorkflowDefinition,
    ) -> NodeFuture<'a> {
        Box::pin(async move {
            match &node.kind {
                NodeKind::Start => self.advance(def, &node.id, instance),
                NodeKind::End => Ok(None),
                NodeKind::Task { topic } => {
                    self.execute_task(topic, node, instance).await?;
                    self.advance(def, &node.id, instance)
                }
                NodeKind::Decision => self.advance(def, &node.id, instance),
                NodeKind::Parallel { branches } => {
                    let mut branch_outputs = serde_json::Map::new();
                    for branch_id in branches {
                        let branch_node = def
                            .node(branch_id)
                            .ok_or_else(|| SuspendOrFail::Fail(format!("parallel branch references unknown node {branch_id}")))?
                            .clone();
                        // Branches execute sequentially (not true concurrency):
                        // see DESIGN.md for the tradeoff.
                        self.execute_node(&branch_node, instance, def).await?;
                        if let Some(output) = instance.context.node_outputs.get(branch_id).cloned() {
                            branch_outputs.insert(branch_id.clone(), output);
                        }
                    }
                    instance.context.node_outputs.insert(node.id.clone(), serde_json::Value::Object(branch_outputs));
                    // Control proceeds to the first common descendant of
                    // every branch (spec §4.G "Parallel"); fall back to the
                    // node's own outgoing edge if the branches never
                    // reconverge.
                    match join_node(def, branches) {
                        Some(join) => Ok(Some(join)),
                        None => self.advance(def, &node.id, instance),
                    }
                }
                NodeKind::Loop { condition, max_iterations } => {
                    let counter_key = format!("__loop_iter::{}", node.id);
                    let iterations = instance.context.variables.get(&counter_key).and_then(|v| v.as_u64()).unwrap_or(0);
                    let condition_true = evaluate_condition(condition, &instance.context, &self.handlers)
                        .map_err(|e| SuspendOrFail::Fail(e.to_string()))?;
                    if condition_true && iterations < *max_iterations as u64 {
                        instance.context.variables.insert(counter_key, serde_json::json!(iterations + 1));
                        loop_body_edge(def, &node.id).map(Some).ok_or_else(|| {
                            SuspendOrFail::Fail(format!("loop node {} has no body edge", node.id))
                        })
                    } else {
                        Ok(loop_exit_edge(def, &node.id))
                    }
                }
                NodeKind::HumanTask { prompt, deadline_epoch_ms } => {
                    let task = HumanTask {
                        id: HumanTaskId::new(),
                        instance_id: instance.id.clone(),
                        node_id: node.id.clone(),
                        prompt: prompt.clone(),
                        status: HumanTaskStatus::Pending,
                        deadline_epoch_ms: *deadline_epoch_ms,
                        response: None,
                        created_at_epoch_ms: self.clock.epoch_ms(),
                    };
                    self.store.save_human_task(task.clone()).map_err(|e| SuspendOrFail::Fail(e.to_string()))?;
                    instance.human_tasks.push(task.id.clone());
                    Err(SuspendOrFail::Suspend(Suspend::HumanTask(task.id)))
                }
                NodeKind::Timer { delay_ms } => {
                    tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                    instance.context.node_outputs.insert(node.id.clone(), serde_json::json!({"slept_ms": delay_ms}));
                    self.advance(def, &node.id, instance)
                }
                NodeKind::Event { event_type } => Err(SuspendOrFail::Suspend(Suspend::Event(event_type.clone()))),
                NodeKind::Subworkflow { def_id } => {
                    self.execute_subworkflow(def_id, node, instance).await?;
                    self.advance(def, &node.id, instance)
                }
                NodeKind::Transform { handler_id } => {
                    let output = self
                        .handlers
                        .call_transform(handler_id, &instance.context)
                        .map_err(|e| SuspendOrFail::Fail(e.to_string()))?;
                    instance.context.node_outputs.insert(node.id.clone(), output);
                    self.advance(def, &node.id, instance)
                }
                NodeKind::Aggregate { inputs, merge } => {
                    let output = aggregate_merge(inputs, *merge, &instance.context);
                    instance.context.node_outputs.insert(node.id.clone(), output);
                    self.advance(def, &node.id, instance)
                }
                NodeKind::Custom { handler_id } => {
                    let output = self
                        .handlers
                        .call_transform(handler_id, &instance.context)
                        .map_err(|e| SuspendOrFail::Fail(e.to_string()))?;
                    instance.context.node_outputs.insert(node.id.clone(), output);
                    self.advance(def, &node.id, instance)
                }
            }
        })
    }

    fn advance(&self, def: &WorkflowDefinition, node_id: &str, instance: &WorkflowInstance) -> Result<Option<String>, SuspendOrFail> {
        select_next_edge(def, node_id, &instance.context, &self.handlers).map_err(|e| SuspendOrFail::Fail(e.to_string()))
    }

    async fn execute_task(&self, topic: &str, node: &Node, instance: &mut WorkflowInstance) -> Result<(), SuspendOrFail> {
        let request = swarm_core::Message::new(
            self.id.clone(),
            Recipient::Broadcast,
            MessageType::Request,
            Priority::Normal,
            self.clock.epoch_ms(),
            Content::new(topic, serde_json::json!({
                "instance_id": instance.id,
                "node_id": node.id,
                "context": instance.context,
            })),
        );
        let pause = self.pause_token(&instance.id);
        let response = tokio::select! {
            _ = pause.cancelled() => return Err(SuspendOrFail::Suspend(Suspend::Paused)),
            result = self.bus.send_and_wait_for_response(request, self.config.task_timeout_ms) => {
                result.map_err(|e| SuspendOrFail::Fail(e.to_string()))?
            }
        };
        instance.context.node_outputs.insert(node.id.clone(), response.content.body);
        Ok(())
    }

    async fn execute_subworkflow(&self, def_id: &WorkflowDefId, node: &Node, instance: &mut WorkflowInstance) -> Result<(), SuspendOrFail> {
        let child_def = self
            .store
            .get_workflow(def_id)
            .map_err(|e| SuspendOrFail::Fail(e.to_string()))?
            .ok_or_else(|| SuspendOrFail::Fail(format!("subworkflow definition {def_id} not found")))?;
        let (_, outcome) = self
            .start(child_def, instance.context.variables.clone(), Some(instance.id.clone()))
            .await
            .map_err(|e| SuspendOrFail::Fail(e.to_string()))?;
        match outcome {
            RunOutcome::Completed => {
                instance.context.node_outputs.insert(node.id.clone(), serde_json::json!({"status": "completed"}));
                Ok(())
            }
            other => Err(SuspendOrFail::Fail(format!("subworkflow did not complete: {other:?}"))),
        }
    }

    /// Persists the instance and takes a snapshot of it at the same point
    /// (spec §4.G / §4.B "Snapshot"). The blob carries the whole instance,
    /// not just its context, so `resume_workflow`/`recover_instance` can
    /// reify a complete `WorkflowInstance` from it alone.
    fn checkpoint(&self, instance: &mut WorkflowInstance) -> Result<(), SwarmError> {
        self.store.update_instance(instance.clone())?;
        let blob = serde_json::to_value(&*instance)
            .map_err(|e| SwarmError::Validation(format!("instance not serializable: {e}")))?;
        let checksum = checksum_of(&blob);
        let snapshot = Snapshot {
            id: swarm_core::SnapshotId::new(),
            instance_id: instance.id.clone(),
            timestamp_epoch_ms: self.clock.epoch_ms(),
            state_blob: blob,
            checksum,
            metadata: None,
        };
        self.store.save_snapshot(snapshot)
    }

    fn record_event(&self, instance: &WorkflowInstance, kind: &str, payload: serde_json::Value) -> Result<(), SwarmError> {
        self.store.record_event(Event::new(instance.id.to_string(), kind, payload, self.clock.epoch_ms()).with_node(instance.current_node.clone()))
    }

    /// Reassigns the coordinator-supplied task to this engine's bus
    /// identity, for callers that need to dispatch a `Task` node's work
    /// directly rather than relying on a responder agent (used when the
    /// engine itself models the work as a single `swarm_core::Task`, e.g.
    /// a workflow that wraps one coordinator-issued goal).
    pub fn describe_as_task(&self, description: impl Into<String>, task_type: impl Into<String>) -> Task {
        Task::new(description, task_type, self.clock.epoch_ms())
    }
}

fn checksum_of(blob: &serde_json::Value) -> String {
    let bytes = serde_json::to_vec(blob).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    format!("{:x}", hasher.finalize())
}

enum Suspend {
    HumanTask(HumanTaskId),
    Event(String),
    Paused,
}

enum SuspendOrFail {
    Suspend(Suspend),
    Fail(String),
}
