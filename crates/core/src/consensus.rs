// SPDX-License-Identifier: MIT

//! Consensus proposal data model (spec §3 "ConsensusProposal").

use crate::agent::AgentId;
use crate::define_id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

define_id! {
    pub struct ProposalId("prop_");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub choice: VoteChoice,
    pub reason: Option<String>,
    pub timestamp_epoch_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusStatus {
    Pending,
    Achieved,
    Rejected,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusProposal {
    pub id: ProposalId,
    pub scope: String,
    pub proposal_body: serde_json::Value,
    /// `(0,1]`.
    pub required_threshold: f64,
    pub votes: BTreeMap<AgentId, Vote>,
    pub eligible_voters: Vec<AgentId>,
    pub deadline_epoch_ms: u64,
    pub status: ConsensusStatus,
}

impl ConsensusProposal {
    pub fn new(
        scope: impl Into<String>,
        proposal_body: serde_json::Value,
        required_threshold: f64,
        eligible_voters: Vec<AgentId>,
        deadline_epoch_ms: u64,
    ) -> Self {
        Self {
            id: ProposalId::new(),
            scope: scope.into(),
            proposal_body,
            required_threshold: required_threshold.clamp(f64::EPSILON, 1.0),
            votes: BTreeMap::new(),
            eligible_voters,
            deadline_epoch_ms,
            status: ConsensusStatus::Pending,
        }
    }

    /// `ratio = positive / eligible_voters`; achieved iff `ratio >=
    /// threshold` (spec follows `>=`, §9 Open Question). Divides by the
    /// eligible pool, not votes cast, so a proposal only a fraction of the
    /// team has voted on can't look "achieved" before the rest weigh in.
    pub fn ratio(&self) -> f64 {
        if self.eligible_voters.is_empty() {
            return 0.0;
        }
        let positive = self.votes.values().filter(|v| v.choice == VoteChoice::Positive).count();
        positive as f64 / self.eligible_voters.len() as f64
    }

    /// True once the outcome is mathematically decided regardless of how
    /// the remaining eligible voters vote: either the threshold is already
    /// met, or even unanimous "yes" from everyone still outstanding
    /// couldn't reach it.
    pub fn is_decided(&self) -> bool {
        if self.ratio() >= self.required_threshold {
            return true;
        }
        let positive = self.votes.values().filter(|v| v.choice == VoteChoice::Positive).count();
        let outstanding = self.eligible_voters.len().saturating_sub(self.votes.len());
        let best_possible = (positive + outstanding) as f64 / self.eligible_voters.len().max(1) as f64;
        best_possible < self.required_threshold
    }

    pub fn record_vote(&mut self, agent: AgentId, vote: Vote) {
        self.votes.insert(agent, vote);
    }

    /// Recompute `status` from current votes/deadline. Idempotent.
    pub fn resolve(&mut self, now_epoch_ms: u64) -> ConsensusStatus {
        if self.status != ConsensusStatus::Pending {
            return self.status;
        }
        if self.ratio() >= self.required_threshold {
            self.status = ConsensusStatus::Achieved;
        } else if self.is_decided() {
            self.status = ConsensusStatus::Rejected;
        } else if now_epoch_ms >= self.deadline_epoch_ms {
            self.status = ConsensusStatus::Expired;
        }
        self.status
    }
}
