// SPDX-License-Identifier: MIT

//! Delivery seam: the bus routes through a `Transport` so a future
//! cross-host backend can be swapped in (spec §1 "optionally cross-host via
//! a pluggable transport") without the bus depending on any wire format.
//! `InProcessTransport` is the only implementation shipped here.

use crate::mailbox::Mailbox;
use parking_lot::RwLock;
use std::collections::HashMap;
use swarm_core::{AgentId, Message, SwarmError};

pub trait Transport: Send + Sync {
    /// Deliver `msg` to `recipient`'s mailbox. Returns `Ok(true)` if a
    /// message was dropped under backpressure to make room for it.
    fn deliver(&self, recipient: &AgentId, msg: Message) -> Result<bool, SwarmError>;

    fn register(&self, agent_id: AgentId) -> Mailbox;
    fn unregister(&self, agent_id: &AgentId);
    fn registered_agents(&self) -> Vec<AgentId>;
    fn mailbox(&self, agent_id: &AgentId) -> Option<Mailbox>;
}

#[derive(Default)]
pub struct InProcessTransport {
    mailboxes: RwLock<HashMap<AgentId, Mailbox>>,
}

impl InProcessTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for InProcessTransport {
    fn deliver(&self, recipient: &AgentId, msg: Message) -> Result<bool, SwarmError> {
        let mailbox = self
            .mailboxes
            .read()
            .get(recipient)
            .cloned()
            .ok_or_else(|| SwarmError::NotFound(format!("agent {recipient} is not registered")))?;
        mailbox.enqueue(msg)
    }

    fn register(&self, agent_id: AgentId) -> Mailbox {
        let mailbox = Mailbox::new();
        self.mailboxes.write().insert(agent_id, mailbox.clone());
        mailbox
    }

    fn unregister(&self, agent_id: &AgentId) {
        self.mailboxes.write().remove(agent_id);
    }

    fn registered_agents(&self) -> Vec<AgentId> {
        self.mailboxes.read().keys().cloned().collect()
    }

    fn mailbox(&self, agent_id: &AgentId) -> Option<Mailbox> {
        self.mailboxes.read().get(agent_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::{Content, MessageType, Priority, Recipient};

    #[test]
    fn deliver_to_unregistered_agent_is_not_found() {
        let transport = InProcessTransport::new();
        let msg = Message::new(
            AgentId::new("ns", "a"),
            Recipient::Single(AgentId::new("ns", "b")),
            MessageType::Inform,
            Priority::Normal,
            0,
            Content::new("t", serde_json::json!({})),
        );
        let err = transport.deliver(&AgentId::new("ns", "b"), msg).unwrap_err();
        assert!(matches!(err, SwarmError::NotFound(_)));
    }

    #[test]
    fn register_then_deliver_succeeds() {
        let transport = InProcessTransport::new();
        let agent = AgentId::new("ns", "b");
        let mailbox = transport.register(agent.clone());
        let msg = Message::new(
            AgentId::new("ns", "a"),
            Recipient::Single(agent.clone()),
            MessageType::Inform,
            Priority::Normal,
            0,
            Content::new("t", serde_json::json!({})),
        );
        transport.deliver(&agent, msg).unwrap();
        assert_eq!(mailbox.len(), 1);
    }
}
