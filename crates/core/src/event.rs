// SPDX-License-Identifier: MIT

//! Generic store event (spec §3 "Event"): the immutable record the state
//! store appends to its log and replays during recovery. Distinct from the
//! bus `Message` -- a `Message` is a live delivery; an `Event` is a durable
//! fact about something that already happened.

use crate::define_id;
use serde::{Deserialize, Serialize};

define_id! {
    pub struct EventId("evt_");
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub instance_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
    pub timestamp_epoch_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

impl Event {
    pub fn new(instance_id: impl Into<String>, kind: impl Into<String>, payload: serde_json::Value, timestamp_epoch_ms: u64) -> Self {
        Self {
            id: EventId::new(),
            instance_id: instance_id.into(),
            kind: kind.into(),
            payload,
            timestamp_epoch_ms,
            node_id: None,
        }
    }

    pub fn with_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }
}
