// SPDX-License-Identifier: MIT

//! Heartbeat tracking (spec §4.D): agents emit an INFORM `heartbeat` at a
//! configurable interval (default 10s); missing three in a row marks the
//! agent `unresponsive`. The scheduler consults this monitor to exclude
//! unresponsive agents from assignment.

use parking_lot::Mutex;
use std::collections::HashMap;
use swarm_core::AgentId;

pub const DEFAULT_HEARTBEAT_MS: u64 = 10_000;
const MISSED_INTERVALS_BEFORE_UNRESPONSIVE: u64 = 3;

#[derive(Default)]
pub struct HeartbeatMonitor {
    last_seen_epoch_ms: Mutex<HashMap<AgentId, u64>>,
    interval_ms: u64,
}

impl HeartbeatMonitor {
    pub fn new(interval_ms: u64) -> Self {
        Self { last_seen_epoch_ms: Mutex::new(HashMap::new()), interval_ms }
    }

    pub fn record(&self, agent: AgentId, now_epoch_ms: u64) {
        self.last_seen_epoch_ms.lock().insert(agent, now_epoch_ms);
    }

    pub fn forget(&self, agent: &AgentId) {
        self.last_seen_epoch_ms.lock().remove(agent);
    }

    /// An agent that has never been seen is not yet considered unresponsive
    /// -- it may simply not have sent its first heartbeat.
    pub fn is_unresponsive(&self, agent: &AgentId, now_epoch_ms: u64) -> bool {
        match self.last_seen_epoch_ms.lock().get(agent) {
            Some(&last_seen) => {
                now_epoch_ms.saturating_sub(last_seen)
                    > self.interval_ms * MISSED_INTERVALS_BEFORE_UNRESPONSIVE
            }
            None => false,
        }
    }

    pub fn unresponsive_agents(&self, now_epoch_ms: u64) -> Vec<AgentId> {
        self.last_seen_epoch_ms
            .lock()
            .iter()
            .filter(|(_, &last_seen)| {
                now_epoch_ms.saturating_sub(last_seen) > self.interval_ms * MISSED_INTERVALS_BEFORE_UNRESPONSIVE
            })
            .map(|(id, _)| id.clone())
            .collect()
    }
}
