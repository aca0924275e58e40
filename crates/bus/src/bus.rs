// SPDX-License-Identifier: MIT

//! `MessageBus`: the routed-delivery contract in spec §4.C / §6. Wraps a
//! `Transport` (in-process by default) with registration, broadcast,
//! request/response correlation with mandatory timeouts, and the metrics
//! snapshot other components poll.

use crate::metrics::BusMetrics;
use crate::transport::{InProcessTransport, Transport};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use swarm_core::{AgentId, Clock, Message, MessageId, MessageType, Priority, SwarmError, SystemClock};
use tokio::sync::oneshot;

/// Tunables the bus needs beyond its hard-coded backpressure limits (spec §6
/// "Environment variables" names `RUNTIME_MAX_AGENTS`, which this config
/// surfaces so an embedder can enforce it at registration time).
#[derive(Debug, Clone, Copy)]
pub struct BusConfig {
    pub max_agents: Option<usize>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { max_agents: None }
    }
}

struct Pending {
    sender: oneshot::Sender<Message>,
    started_at_ms: u64,
}

/// The shared message bus. Cheap to clone (all state behind `Arc`); a single
/// instance is constructed by the `Runtime` owner and handed to every
/// component that sends or receives messages.
#[derive(Clone)]
pub struct MessageBus<C: Clock = SystemClock> {
    transport: Arc<dyn Transport>,
    pending: Arc<Mutex<HashMap<MessageId, Pending>>>,
    metrics: Arc<Mutex<BusMetrics>>,
    clock: C,
    config: BusConfig,
}

impl MessageBus<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MessageBus<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MessageBus<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            transport: Arc::new(InProcessTransport::new()),
            pending: Arc::new(Mutex::new(HashMap::new())),
            metrics: Arc::new(Mutex::new(BusMetrics::new())),
            clock,
            config: BusConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Registration binds an `AgentId` to a fresh mailbox (spec §4.C
    /// "Registration").
    pub fn register(&self, agent_id: AgentId) -> Result<crate::mailbox::Mailbox, SwarmError> {
        if let Some(max) = self.config.max_agents {
            if self.transport.registered_agents().len() >= max {
                return Err(SwarmError::Validation(format!(
                    "max_agents ({max}) reached, refusing to register {agent_id}"
                )));
            }
        }
        Ok(self.transport.register(agent_id))
    }

    pub fn deregister(&self, agent_id: &AgentId) {
        self.transport.unregister(agent_id);
    }

    pub fn mailbox(&self, agent_id: &AgentId) -> Option<crate::mailbox::Mailbox> {
        self.transport.mailbox(agent_id)
    }

    pub fn registered_agents(&self) -> Vec<AgentId> {
        self.transport.registered_agents()
    }

    /// `send(Message) -> ok | error` (spec §4.C "Send contract"). Delivers
    /// one independent copy per resolved recipient; a `RESPONSE` whose
    /// `correlation_id` matches a pending `sendAndWaitForResponse` call
    /// resolves that waiter instead of (also) landing in a mailbox.
    pub fn send(&self, msg: Message) -> Result<(), SwarmError> {
        if msg.kind == MessageType::Response {
            if let Some(correlation_id) = &msg.correlation_id {
                if self.resolve_pending(correlation_id, &msg) {
                    let mut metrics = self.metrics.lock();
                    metrics.record_delivery(&msg.from.address());
                    return Ok(());
                }
                tracing::warn!(correlation_id = %correlation_id, "late response dropped, no pending waiter");
                return Ok(());
            }
        }

        let registered = self.transport.registered_agents();
        let recipients = msg.recipients(&registered);
        if recipients.is_empty() && !matches!(msg.to, swarm_core::Recipient::Broadcast) {
            return Err(SwarmError::NotFound(format!("no recipients resolved for message {}", msg.id)));
        }

        for recipient in &recipients {
            if msg.violates_no_self_delivery(recipient, true) {
                return Err(SwarmError::Validation(format!(
                    "message {} would self-deliver to {recipient} without an INFORM self-loop",
                    msg.id
                )));
            }
        }

        let mut metrics = self.metrics.lock();
        for recipient in recipients {
            match self.transport.deliver(&recipient, msg.clone()) {
                Ok(_dropped_low_priority) => {
                    metrics.record_delivery(&recipient.address());
                }
                Err(err) => {
                    metrics.record_failure();
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Convenience wrapper building an `INFORM` broadcast (spec §4.C).
    pub fn broadcast(
        &self,
        from: AgentId,
        topic: impl Into<String>,
        body: serde_json::Value,
        priority: Priority,
    ) -> Result<(), SwarmError> {
        let msg = Message::new(
            from,
            swarm_core::Recipient::Broadcast,
            MessageType::Inform,
            priority,
            self.clock.epoch_ms(),
            swarm_core::Content::new(topic, body),
        );
        self.send(msg)
    }

    /// `sendAndWaitForResponse(msg, timeoutMs) -> Message | timeout` (spec
    /// §4.C). Registers `correlation_id := msg.id` in the pending table
    /// before sending, so a response racing the registration can never be
    /// missed; surfaces `SwarmError::Timeout` if nothing matches in time.
    pub async fn send_and_wait_for_response(
        &self,
        mut msg: Message,
        timeout_ms: u64,
    ) -> Result<Message, SwarmError> {
        msg.requires_response = true;
        let correlation_id = msg.id.clone();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(
            correlation_id.clone(),
            Pending { sender: tx, started_at_ms: self.clock.epoch_ms() },
        );

        if let Err(err) = self.send(msg) {
            self.pending.lock().remove(&correlation_id);
            return Err(err);
        }

        match tokio::time::timeout(Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(response)) => {
                let elapsed = self.clock.epoch_ms().saturating_sub(
                    self.pending
                        .lock()
                        .remove(&correlation_id)
                        .map(|p| p.started_at_ms)
                        .unwrap_or(self.clock.epoch_ms()),
                );
                self.metrics.lock().record_response_time(elapsed);
                Ok(response)
            }
            Ok(Err(_canceled)) => {
                self.pending.lock().remove(&correlation_id);
                Err(SwarmError::Timeout(timeout_ms))
            }
            Err(_elapsed) => {
                self.pending.lock().remove(&correlation_id);
                self.metrics.lock().record_failure();
                Err(SwarmError::Timeout(timeout_ms))
            }
        }
    }

    fn resolve_pending(&self, correlation_id: &MessageId, response: &Message) -> bool {
        if let Some(pending) = self.pending.lock().remove(correlation_id) {
            let _ = pending.sender.send(response.clone());
            true
        } else {
            false
        }
    }

    /// Bus-wide coordination metrics (spec §4.C "Metrics").
    pub fn metrics(&self) -> BusMetricsSnapshot {
        let metrics = self.metrics.lock();
        let agents = self.transport.registered_agents();
        let queue_sizes = agents
            .iter()
            .filter_map(|a| self.transport.mailbox(a).map(|m| (a.address(), m.len())))
            .collect();
        BusMetricsSnapshot {
            message_count: metrics.message_count,
            active_agents: agents.len(),
            average_response_time_ms: metrics.average_response_time_ms.value(),
            queue_sizes,
            failure_rate: metrics.failure_rate(),
            per_recipient_counts: metrics.per_recipient_counts.clone(),
        }
    }
}

/// Point-in-time read of `BusMetrics`, shaped for external consumption.
#[derive(Debug, Clone)]
pub struct BusMetricsSnapshot {
    pub message_count: u64,
    pub active_agents: usize,
    pub average_response_time_ms: f64,
    pub queue_sizes: Vec<(String, usize)>,
    pub failure_rate: f64,
    pub per_recipient_counts: std::collections::BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::{Content, FakeClock, Recipient};

    fn content(topic: &str) -> Content {
        Content::new(topic, serde_json::json!({}))
    }

    #[tokio::test]
    async fn send_delivers_to_single_recipient() {
        let bus = MessageBus::with_clock(FakeClock::default());
        let a1 = AgentId::new("ns", "a1");
        let a2 = AgentId::new("ns", "a2");
        let mbox = bus.register(a2.clone()).unwrap();
        bus.register(a1.clone()).unwrap();
        let msg = Message::new(
            a1,
            Recipient::Single(a2),
            MessageType::Inform,
            Priority::Normal,
            0,
            content("x"),
        );
        bus.send(msg).unwrap();
        assert_eq!(mbox.len(), 1);
    }

    #[tokio::test]
    async fn broadcast_reaches_everyone_but_sender() {
        let bus = MessageBus::with_clock(FakeClock::default());
        let a1 = AgentId::new("ns", "a1");
        let a2 = AgentId::new("ns", "a2");
        let a3 = AgentId::new("ns", "a3");
        bus.register(a1.clone()).unwrap();
        let m2 = bus.register(a2.clone()).unwrap();
        let m3 = bus.register(a3.clone()).unwrap();
        bus.broadcast(a1, "heartbeat", serde_json::json!({}), Priority::Low).unwrap();
        assert_eq!(m2.len(), 1);
        assert_eq!(m3.len(), 1);
    }

    #[tokio::test]
    async fn send_and_wait_resolves_on_matching_response() {
        let bus = MessageBus::with_clock(FakeClock::default());
        let a1 = AgentId::new("ns", "a1");
        let a2 = AgentId::new("ns", "a2");
        bus.register(a1.clone()).unwrap();
        let mbox2 = bus.register(a2.clone()).unwrap();

        let req = Message::new(
            a1.clone(),
            Recipient::Single(a2.clone()),
            MessageType::Request,
            Priority::Normal,
            0,
            content("ping"),
        );
        let req_id = req.id.clone();
        let bus2 = bus.clone();
        let waiter = tokio::spawn(async move { bus2.send_and_wait_for_response(req, 1_000).await });

        // simulate the agent consuming the request and replying
        let received = mbox2.recv().await;
        assert_eq!(received.id, req_id);
        let response = received.respond(a2, serde_json::json!({"pong": true}));
        bus.send(response).unwrap();

        let resolved = waiter.await.unwrap().unwrap();
        assert_eq!(resolved.correlation_id, Some(req_id));
    }

    #[tokio::test]
    async fn send_and_wait_times_out_without_response() {
        let bus = MessageBus::with_clock(FakeClock::default());
        let a1 = AgentId::new("ns", "a1");
        let a2 = AgentId::new("ns", "a2");
        bus.register(a1.clone()).unwrap();
        bus.register(a2.clone()).unwrap();
        let req = Message::new(
            a1,
            Recipient::Single(a2),
            MessageType::Request,
            Priority::Normal,
            0,
            content("ping"),
        );
        let err = bus.send_and_wait_for_response(req, 20).await.unwrap_err();
        assert!(matches!(err, SwarmError::Timeout(20)));
    }

    #[tokio::test]
    async fn late_response_after_timeout_is_dropped_not_errored() {
        let bus = MessageBus::with_clock(FakeClock::default());
        let a1 = AgentId::new("ns", "a1");
        let a2 = AgentId::new("ns", "a2");
        bus.register(a1.clone()).unwrap();
        let mbox2 = bus.register(a2.clone()).unwrap();
        let req = Message::new(
            a1,
            Recipient::Single(a2.clone()),
            MessageType::Request,
            Priority::Normal,
            0,
            content("ping"),
        );
        let err = bus.send_and_wait_for_response(req, 10).await.unwrap_err();
        assert!(matches!(err, SwarmError::Timeout(10)));

        let received = mbox2.recv().await;
        let response = received.respond(a2, serde_json::json!({}));
        // resolving after the waiter already timed out must not panic or error
        bus.send(response).unwrap();
    }

    #[tokio::test]
    async fn metrics_report_active_agents_and_queue_sizes() {
        let bus = MessageBus::with_clock(FakeClock::default());
        let a1 = AgentId::new("ns", "a1");
        let a2 = AgentId::new("ns", "a2");
        bus.register(a1.clone()).unwrap();
        bus.register(a2.clone()).unwrap();
        bus.send(Message::new(
            a1,
            Recipient::Single(a2),
            MessageType::Inform,
            Priority::Normal,
            0,
            content("x"),
        ))
        .unwrap();
        let snapshot = bus.metrics();
        assert_eq!(snapshot.active_agents, 2);
        assert_eq!(snapshot.message_count, 1);
    }

    #[tokio::test]
    async fn send_to_unregistered_single_recipient_errors() {
        let bus = MessageBus::with_clock(FakeClock::default());
        let a1 = AgentId::new("ns", "a1");
        bus.register(a1.clone()).unwrap();
        let msg = Message::new(
            a1,
            Recipient::Single(AgentId::new("ns", "ghost")),
            MessageType::Inform,
            Priority::Normal,
            0,
            content("x"),
        );
        let err = bus.send(msg).unwrap_err();
        assert!(matches!(err, SwarmError::NotFound(_)));
    }
}
