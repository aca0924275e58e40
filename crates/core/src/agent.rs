// SPDX-License-Identifier: MIT

//! Agent identity and profile types (spec §3 "AgentId" / "AgentProfile").

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// `(namespace, id)` pair. Unique within a process; `namespace:id` is the
/// bus address used for routing and logging.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId {
    pub namespace: String,
    pub id: String,
}

impl AgentId {
    pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), id: id.into() }
    }

    /// The bus address: `namespace:id`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.namespace, self.id)
    }

    /// Parse a bus address back into an `AgentId`. The namespace is
    /// everything before the first `:`; ids without a `:` get an empty
    /// namespace.
    pub fn parse_address(addr: &str) -> Self {
        match addr.split_once(':') {
            Some((ns, id)) => Self::new(ns, id),
            None => Self::new("", addr),
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address())
    }
}

/// Closed set of agent type tags used for capability-bonus scoring
/// (spec §4.E "0.2 bonus if agent type matches task type").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Coordinator,
    Researcher,
    Coder,
    Analyst,
    Architect,
    Tester,
    Reviewer,
    Optimizer,
    Documenter,
    Monitor,
    Specialist,
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentType::Coordinator => "coordinator",
            AgentType::Researcher => "researcher",
            AgentType::Coder => "coder",
            AgentType::Analyst => "analyst",
            AgentType::Architect => "architect",
            AgentType::Tester => "tester",
            AgentType::Reviewer => "reviewer",
            AgentType::Optimizer => "optimizer",
            AgentType::Documenter => "documenter",
            AgentType::Monitor => "monitor",
            AgentType::Specialist => "specialist",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle state of an agent, as reported through `state:query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentLifecycle {
    Idle,
    Active,
    Busy,
    Error,
    Offline,
    /// Missed heartbeats past 3x the configured interval (spec §4.D).
    Unresponsive,
}

impl AgentLifecycle {
    /// Agents in these states are never candidates for assignment.
    pub fn is_available(&self) -> bool {
        matches!(self, AgentLifecycle::Idle | AgentLifecycle::Active)
    }
}

/// `name -> proficiency` where proficiency is clamped to `[0,1]`.
pub type Capabilities = BTreeMap<String, f64>;

/// Stable agent description: id, type, capability set, and current
/// lifecycle state, plus the reported workload scalar used by scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: AgentId,
    pub agent_type: AgentType,
    pub capabilities: Capabilities,
    pub lifecycle: AgentLifecycle,
    /// Agent-reported scalar in `[0,100]`; units are not otherwise defined
    /// (spec §9 Open Question).
    pub workload: u8,
    /// Count of tasks this agent has completed, used as the scheduler's
    /// spread-load tie-break (spec §4.E).
    pub tasks_completed: u64,
    /// Registration order, used as the final tie-break (earliest wins).
    pub registered_at_epoch_ms: u64,
}

impl AgentProfile {
    pub fn new(id: AgentId, agent_type: AgentType, registered_at_epoch_ms: u64) -> Self {
        Self {
            id,
            agent_type,
            capabilities: Capabilities::new(),
            lifecycle: AgentLifecycle::Idle,
            workload: 0,
            tasks_completed: 0,
            registered_at_epoch_ms,
        }
    }

    pub fn with_capability(mut self, name: impl Into<String>, proficiency: f64) -> Self {
        self.capabilities.insert(name.into(), proficiency.clamp(0.0, 1.0));
        self
    }

    pub fn is_available(&self) -> bool {
        self.lifecycle.is_available()
    }
}
