// SPDX-License-Identifier: MIT

//! Message envelope and priority (spec §3, §6 "Message envelope").

use crate::agent::AgentId;
use crate::define_id;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

define_id! {
    /// Opaque message id; also used as the default correlation id.
    pub struct MessageId("msg_");
}

/// `LOW < NORMAL < HIGH < URGENT`. `Ord` follows declaration order so a
/// `BinaryHeap` naturally surfaces the highest-priority message first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Command,
    Request,
    Inform,
    Negotiate,
    Consensus,
    Response,
}

/// Who a message is delivered to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipient {
    Single(AgentId),
    Set(Vec<AgentId>),
    /// `to = null` on the wire.
    Broadcast,
}

impl Recipient {
    /// Expand to the concrete list of recipients given the set of agents
    /// currently registered with the bus (needed to resolve broadcast).
    pub fn resolve(&self, sender: &AgentId, registered: &[AgentId]) -> Vec<AgentId> {
        match self {
            Recipient::Single(id) => vec![id.clone()],
            Recipient::Set(ids) => ids.clone(),
            Recipient::Broadcast => {
                registered.iter().filter(|a| *a != sender).cloned().collect()
            }
        }
    }
}

/// `{topic, body}` payload (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub topic: String,
    pub body: serde_json::Value,
}

impl Content {
    pub fn new(topic: impl Into<String>, body: serde_json::Value) -> Self {
        Self { topic: topic.into(), body }
    }
}

/// Reserved topics every agent must respond to (spec §6).
pub mod topics {
    pub const CAPABILITY_QUERY: &str = "capability:query";
    pub const STATE_QUERY: &str = "state:query";
    pub const PERFORMANCE_METRICS: &str = "performance:metrics";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const TASK_ASSIGNMENT: &str = "task:assignment";
    pub const TASK_CANCEL: &str = "task:cancel";
    pub const TEAM_DISBANDED: &str = "team:disbanded";

    pub fn consensus(proposal_id: &str) -> String {
        format!("consensus:{proposal_id}")
    }
}

/// A message routed through the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub from: AgentId,
    pub to: Recipient,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub priority: Priority,
    pub timestamp_epoch_ms: u64,
    pub content: Content,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub requires_response: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<MessageId>,
}

impl Message {
    pub fn new(
        from: AgentId,
        to: Recipient,
        kind: MessageType,
        priority: Priority,
        timestamp_epoch_ms: u64,
        content: Content,
    ) -> Self {
        Self {
            id: MessageId::new(),
            from,
            to,
            kind,
            priority,
            timestamp_epoch_ms,
            content,
            requires_response: false,
            correlation_id: None,
        }
    }

    pub fn requiring_response(mut self) -> Self {
        self.requires_response = true;
        self
    }

    /// Build the `RESPONSE` this message expects, addressed back to the sender.
    pub fn respond(&self, from: AgentId, body: serde_json::Value) -> Message {
        Message {
            id: MessageId::new(),
            from,
            to: Recipient::Single(self.from.clone()),
            kind: MessageType::Response,
            priority: self.priority,
            timestamp_epoch_ms: self.timestamp_epoch_ms,
            content: Content::new(self.content.topic.clone(), body),
            requires_response: false,
            correlation_id: Some(self.id.clone()),
        }
    }

    /// P1: no self-delivery, except an explicit INFORM self-loop.
    pub fn violates_no_self_delivery(&self, recipient: &AgentId, self_loop_allowed: bool) -> bool {
        if self_loop_allowed && self.kind == MessageType::Inform {
            return false;
        }
        &self.from == recipient
    }

    pub fn recipients(&self, registered: &[AgentId]) -> HashSet<AgentId> {
        self.to.resolve(&self.from, registered).into_iter().collect()
    }
}
