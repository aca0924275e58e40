// SPDX-License-Identifier: MIT

//! Per-agent mailbox consumer loop (spec §4.D): processes one message at a
//! time, at most one in flight, responds to reserved topics, and drives
//! `task:assignment` through to a terminal `RESPONSE`.

use crate::handle::{AgentHandle, AgentOutcome, ProgressReporter};
use parking_lot::Mutex;
use std::sync::Arc;
use swarm_bus::MessageBus;
use swarm_core::{
    topics, AgentId, AgentLifecycle, AgentType, Clock, Content, Message, MessageType, Priority,
    SystemClock,
};

#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    pub heartbeat_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { heartbeat_interval_ms: crate::heartbeat::DEFAULT_HEARTBEAT_MS }
    }
}

struct RuntimeState {
    lifecycle: AgentLifecycle,
    workload: u8,
    tasks_completed: u64,
}

/// Owns one agent's mailbox and drives its consumer loop plus heartbeat
/// emission. Constructed with a concrete [`AgentHandle`] supplying the
/// opaque compute behavior.
pub struct AgentRuntime<C: Clock = SystemClock> {
    id: AgentId,
    agent_type: AgentType,
    bus: MessageBus<C>,
    mailbox: swarm_bus::Mailbox,
    handle: Arc<dyn AgentHandle>,
    state: Mutex<RuntimeState>,
    config: RuntimeConfig,
    clock: C,
}

impl AgentRuntime<SystemClock> {
    pub fn new(
        bus: MessageBus<SystemClock>,
        id: AgentId,
        agent_type: AgentType,
        handle: Arc<dyn AgentHandle>,
    ) -> Result<Self, swarm_core::SwarmError> {
        Self::with_clock(bus, id, agent_type, handle, SystemClock, RuntimeConfig::default())
    }
}

impl<C: Clock> AgentRuntime<C> {
    pub fn with_clock(
        bus: MessageBus<C>,
        id: AgentId,
        agent_type: AgentType,
        handle: Arc<dyn AgentHandle>,
        clock: C,
        config: RuntimeConfig,
    ) -> Result<Self, swarm_core::SwarmError> {
        let mailbox = bus.register(id.clone())?;
        Ok(Self {
            id,
            agent_type,
            bus,
            mailbox,
            handle,
            state: Mutex::new(RuntimeState {
                lifecycle: AgentLifecycle::Idle,
                workload: 0,
                tasks_completed: 0,
            }),
            config,
            clock,
        })
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn lifecycle(&self) -> AgentLifecycle {
        self.state.lock().lifecycle
    }

    pub fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    /// Drains the mailbox forever, processing one message at a time. Callers
    /// typically `tokio::spawn` this alongside [`Self::heartbeat_loop`].
    pub async fn run(self: Arc<Self>) {
        loop {
            let msg = self.mailbox.recv().await;
            self.process(msg).await;
        }
    }

    /// Emits an INFORM heartbeat (LOW priority) on `config.heartbeat_interval_ms`
    /// until cancelled (spec §4.D).
    pub async fn heartbeat_loop(self: Arc<Self>, cancel: tokio_cancel::CancellationToken) {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(self.config.heartbeat_interval_ms));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let workload = self.state.lock().workload;
                    let _ = self.bus.broadcast(
                        self.id.clone(),
                        topics::HEARTBEAT,
                        serde_json::json!({"workload": workload}),
                        Priority::Low,
                    );
                }
                _ = cancel.cancelled() => break,
            }
        }
    }

    async fn process(&self, msg: Message) {
        let topic = msg.content.topic.clone();
        match topic.as_str() {
            topics::CAPABILITY_QUERY => self.respond(&msg, serde_json::json!(self.handle.capabilities())),
            topics::STATE_QUERY => {
                let state = self.state.lock();
                self.respond(
                    &msg,
                    serde_json::json!({"state": format!("{:?}", state.lifecycle).to_lowercase(), "workload": state.workload}),
                );
            }
            topics::PERFORMANCE_METRICS => {
                let metrics = self.handle.performance_metrics();
                let tasks_completed = self.state.lock().tasks_completed;
                let mut body = metrics;
                if let Some(obj) = body.as_object_mut() {
                    obj.insert("tasks_completed".into(), serde_json::json!(tasks_completed));
                }
                self.respond(&msg, body);
            }
            topics::TASK_ASSIGNMENT if msg.kind == MessageType::Command => {
                self.execute_assignment(msg).await;
            }
            topics::TASK_CANCEL => {
                tracing::info!(agent = %self.id, "received task:cancel, returning to idle");
                self.state.lock().lifecycle = AgentLifecycle::Idle;
            }
            other => {
                tracing::debug!(agent = %self.id, topic = other, "unhandled topic, no reserved responder");
                if msg.requires_response {
                    self.respond(&msg, serde_json::json!({"error": "unhandled topic"}));
                }
            }
        }
    }

    async fn execute_assignment(&self, msg: Message) {
        self.state.lock().lifecycle = AgentLifecycle::Busy;

        let (reporter, mut progress_rx) = ProgressReporter::new();
        let bus = self.bus.clone();
        let from = self.id.clone();
        let to = msg.from.clone();
        let forward = tokio::spawn(async move {
            while let Some(progress) = progress_rx.recv().await {
                let inform = Message::new(
                    from.clone(),
                    swarm_core::Recipient::Single(to.clone()),
                    MessageType::Inform,
                    Priority::Normal,
                    0,
                    Content::new("task:progress", serde_json::json!({"progress": progress})),
                );
                let _ = bus.send(inform);
            }
        });

        let outcome = self.handle.execute(msg.content.body.clone(), reporter).await;
        forward.abort();

        {
            let mut state = self.state.lock();
            state.lifecycle = AgentLifecycle::Idle;
            if matches!(outcome, Ok(AgentOutcome::Success(_))) {
                state.tasks_completed += 1;
            }
        }

        if msg.requires_response {
            let body = match outcome {
                Ok(AgentOutcome::Success(outputs)) => serde_json::json!({"success": true, "outputs": outputs}),
                Ok(AgentOutcome::Failure(reason)) => serde_json::json!({"success": false, "reason": reason}),
                Err(err) => serde_json::json!({"success": false, "reason": err.to_string()}),
            };
            self.respond(&msg, body);
        }
    }

    fn respond(&self, msg: &Message, body: serde_json::Value) {
        if !msg.requires_response {
            return;
        }
        let response = msg.respond(self.id.clone(), body);
        if let Err(err) = self.bus.send(response) {
            tracing::warn!(agent = %self.id, error = %err, "failed to send response");
        }
    }
}

/// Thin re-export so this crate doesn't need a direct `tokio-util` dependency
/// purely for the cancellation token type used by [`AgentRuntime::heartbeat_loop`].
pub mod tokio_cancel {
    pub use tokio_util::sync::CancellationToken;
}
