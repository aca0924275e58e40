// SPDX-License-Identifier: MIT

//! Consensus driver (spec §4.F "Consensus driver"): broadcasts a
//! `ConsensusProposal`, collects `NEGOTIATE`/`RESPONSE` votes from the
//! team, and drives it to `achieved`, `rejected`, or `expired`.

use std::time::Duration;

use swarm_bus::{Mailbox, MessageBus};
use swarm_core::{
    topics, AgentId, Clock, ConsensusProposal, ConsensusStatus, Content, Event, Message, MessageType, Priority,
    Recipient, SwarmError, Vote, VoteChoice,
};
use swarm_store::StateStore;

/// Default consensus threshold (`RUNTIME_CONSENSUS_THRESHOLD`, spec §4.F:
/// "default 0.66").
pub const DEFAULT_CONSENSUS_THRESHOLD: f64 = 0.66;

pub struct ConsensusDriver<C: Clock> {
    bus: MessageBus<C>,
    clock: C,
}

impl<C: Clock> ConsensusDriver<C> {
    pub fn new(bus: MessageBus<C>, clock: C) -> Self {
        Self { bus, clock }
    }

    /// Open a new proposal with `deadline = now + timeout_ms` (spec §4.F
    /// "Consensus driver": "broadcast with requires_response, deadline =
    /// now + proposal.timeout").
    pub fn open(
        &self,
        scope: impl Into<String>,
        body: serde_json::Value,
        threshold: f64,
        eligible_voters: Vec<AgentId>,
        timeout_ms: u64,
    ) -> ConsensusProposal {
        ConsensusProposal::new(scope, body, threshold, eligible_voters, self.clock.epoch_ms() + timeout_ms)
    }

    /// Broadcast the proposal as a `CONSENSUS` message on `consensus:<id>`,
    /// requiring a response from every team member.
    pub fn broadcast(&self, from: AgentId, proposal: &ConsensusProposal) -> Result<(), SwarmError> {
        let msg = Message::new(
            from,
            Recipient::Broadcast,
            MessageType::Consensus,
            Priority::High,
            self.clock.epoch_ms(),
            Content::new(
                topics::consensus(proposal.id.as_str()),
                serde_json::json!({
                    "proposal_id": proposal.id,
                    "scope": proposal.scope,
                    "body": proposal.proposal_body,
                    "threshold": proposal.required_threshold,
                    "deadline_epoch_ms": proposal.deadline_epoch_ms,
                }),
            ),
        )
        .requiring_response();
        self.bus.send(msg)
    }

    /// Parse a vote out of an incoming `NEGOTIATE`/`RESPONSE` message body
    /// (`{"choice": "positive"|"negative", "reason": ...}`) and record it
    /// against `proposal`, ignoring votes for a different proposal or from
    /// a non-eligible voter.
    pub fn ingest_vote(&self, proposal: &mut ConsensusProposal, msg: &Message) {
        if !matches!(msg.kind, MessageType::Negotiate | MessageType::Response) {
            return;
        }
        if msg.content.topic != topics::consensus(proposal.id.as_str()) {
            return;
        }
        if !proposal.eligible_voters.contains(&msg.from) {
            return;
        }
        let Some(choice_str) = msg.content.body.get("choice").and_then(|v| v.as_str()) else { return };
        let choice = match choice_str {
            "positive" => VoteChoice::Positive,
            "negative" => VoteChoice::Negative,
            _ => return,
        };
        let reason = msg.content.body.get("reason").and_then(|v| v.as_str()).map(str::to_string);
        proposal.record_vote(msg.from.clone(), Vote { choice, reason, timestamp_epoch_ms: msg.timestamp_epoch_ms });
    }

    /// Drive `proposal` to a terminal status: consume votes off `mailbox`
    /// until `is_decided()` or the deadline passes. The caller is
    /// responsible for having already called [`Self::broadcast`].
    pub async fn drive(&self, proposal: &mut ConsensusProposal, mailbox: &Mailbox) -> ConsensusStatus {
        loop {
            let now = self.clock.epoch_ms();
            let resolved = proposal.resolve(now);
            if resolved != ConsensusStatus::Pending {
                return resolved;
            }
            let remaining = proposal.deadline_epoch_ms.saturating_sub(now);
            if remaining == 0 {
                return proposal.resolve(now);
            }
            match tokio::time::timeout(Duration::from_millis(remaining), mailbox.recv()).await {
                Ok(msg) => self.ingest_vote(proposal, &msg),
                Err(_elapsed) => return proposal.resolve(self.clock.epoch_ms()),
            }
        }
    }

    /// Persist a `consensus.<status>` event recording a just-resolved
    /// proposal's final outcome (spec §8 scenarios 4/5: "`consensus.achieved`
    /// event recorded"). Errors if the proposal is still `Pending`.
    pub fn record_resolution(&self, store: &dyn StateStore, proposal: &ConsensusProposal) -> Result<(), SwarmError> {
        let kind = match proposal.status {
            ConsensusStatus::Achieved => "consensus.achieved",
            ConsensusStatus::Rejected => "consensus.rejected",
            ConsensusStatus::Expired => "consensus.expired",
            ConsensusStatus::Pending => return Err(SwarmError::Validation(format!("proposal {} is not yet resolved", proposal.id))),
        };
        store.record_event(Event::new(
            proposal.id.to_string(),
            kind,
            serde_json::json!({"scope": proposal.scope, "ratio": proposal.ratio()}),
            self.clock.epoch_ms(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::FakeClock;

    fn voters(n: usize) -> Vec<AgentId> {
        (0..n).map(|i| AgentId::new("ns", format!("v{i}"))).collect()
    }

    #[tokio::test]
    async fn ingest_vote_ignores_mismatched_proposal_topic() {
        let bus = MessageBus::with_clock(FakeClock::default());
        let driver = ConsensusDriver::new(bus, FakeClock::default());
        let mut proposal = driver.open("scope", serde_json::json!({}), 0.66, voters(3), 10_000);
        let stranger = Message::new(
            AgentId::new("ns", "v0"),
            Recipient::Single(AgentId::new("ns", "coordinator")),
            MessageType::Response,
            Priority::Normal,
            0,
            Content::new("consensus:other", serde_json::json!({"choice": "positive"})),
        );
        driver.ingest_vote(&mut proposal, &stranger);
        assert!(proposal.votes.is_empty());
    }

    #[tokio::test]
    async fn ingest_vote_records_eligible_voter_choice() {
        let bus = MessageBus::with_clock(FakeClock::default());
        let driver = ConsensusDriver::new(bus, FakeClock::default());
        let eligible = voters(3);
        let proposal = driver.open("scope", serde_json::json!({}), 0.66, eligible.clone(), 10_000);
        let mut p = proposal;
        let msg = Message::new(
            eligible[0].clone(),
            Recipient::Single(AgentId::new("ns", "coordinator")),
            MessageType::Response,
            Priority::Normal,
            0,
            Content::new(topics::consensus(p.id.as_str()), serde_json::json!({"choice": "positive"})),
        );
        driver.ingest_vote(&mut p, &msg);
        assert_eq!(p.votes.len(), 1);
    }

    #[tokio::test]
    async fn drive_expires_when_deadline_passes_with_no_votes() {
        let clock = FakeClock::default();
        let bus = MessageBus::with_clock(clock.clone());
        let driver = ConsensusDriver::new(bus, clock.clone());
        let mailbox = Mailbox::new();
        let mut proposal = driver.open("scope", serde_json::json!({}), 0.66, voters(3), 0);
        let status = driver.drive(&mut proposal, &mailbox).await;
        assert_eq!(status, ConsensusStatus::Expired);
    }
}
