// SPDX-License-Identifier: MIT

//! Team data model (spec §3 "Team"). Team *logic* -- CRUD, formation
//! selection, reformation -- lives in `swarm-coordinator`; this crate only
//! carries the shape and the invariants that shape must uphold.

use crate::agent::AgentId;
use crate::define_id;
use crate::task::TaskId;
use serde::{Deserialize, Serialize};

define_id! {
    pub struct TeamId("team_");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formation {
    Hierarchical,
    Flat,
    Matrix,
    Dynamic,
}

impl Formation {
    /// Declared order used to break scoring ties (spec §4.E "Strategy
    /// selection").
    pub const DECLARED_ORDER: [Formation; 4] =
        [Formation::Hierarchical, Formation::Flat, Formation::Matrix, Formation::Dynamic];

    pub fn structure_topic(&self) -> &'static str {
        match self {
            Formation::Hierarchical => "structure:hierarchical",
            Formation::Flat => "structure:flat",
            Formation::Matrix => "structure:matrix",
            Formation::Dynamic => "structure:dynamic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamStatus {
    Forming,
    Active,
    Executing,
    Disbanded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub leader: AgentId,
    /// Ordered; `leader` is always a member (invariant enforced by the
    /// coordinator, not representable here as a type-level guarantee).
    pub members: Vec<AgentId>,
    pub goals: Vec<TaskId>,
    pub formation: Formation,
    pub status: TeamStatus,
    pub created_at_epoch_ms: u64,
}

impl Team {
    pub fn new(name: impl Into<String>, leader: AgentId, formation: Formation, created_at_epoch_ms: u64) -> Self {
        Self {
            id: TeamId::new(),
            name: name.into(),
            members: vec![leader.clone()],
            leader,
            goals: Vec::new(),
            formation,
            status: TeamStatus::Forming,
            created_at_epoch_ms,
        }
    }

    /// I5/P4: a team is disbanded iff it has zero members.
    pub fn invariant_holds(&self) -> bool {
        (self.members.is_empty()) == (self.status == TeamStatus::Disbanded)
    }
}
