// SPDX-License-Identifier: MIT

//! End-to-end scenario 5 (spec §8): 5-member team, proposal threshold
//! 0.66, only two positive votes before the deadline. Expect the proposal
//! to stay `pending` until the deadline, then resolve `expired` with no
//! decision applied -- the affected task is cancelled and resubmitted as a
//! retry rather than silently dropped.
//!
//! As in scenario 4, the proposer does not vote on its own proposal, so
//! the eligible pool is the other four members -- two positive votes is
//! 0.5, short of 0.66, and the two outstanding voters could still in
//! principle push it to 1.0, so it stays `pending` rather than `rejected`
//! until the deadline passes.

use std::sync::Arc;

use swarm_core::{topics, AgentId, ConsensusStatus, FakeClock, Formation, MessageType, Priority};
use swarm_coordinator::TeamRegistry;
use swarm_scheduler::{ConsensusDriver, Scheduler, SchedulerConfig};
use swarm_store::{MemoryStore, StateStore};

fn vote_message(voter: AgentId, proposal_id: &str, choice: &str) -> swarm_core::Message {
    swarm_core::Message::new(
        voter,
        swarm_core::Recipient::Broadcast,
        MessageType::Response,
        Priority::Normal,
        0,
        swarm_core::Content::new(topics::consensus(proposal_id), serde_json::json!({"choice": choice})),
    )
}

#[tokio::test]
async fn two_of_four_positive_votes_expires_without_applying_the_decision() {
    let clock = FakeClock::default();
    let bus = swarm_bus::MessageBus::with_clock(clock.clone());
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());

    let leader = AgentId::new("team", "a1");
    let members: Vec<AgentId> = (2..=5).map(|i| AgentId::new("team", format!("a{i}"))).collect();

    let registry = TeamRegistry::new();
    let team_id = registry.create_team("alpha", leader.clone(), Formation::Hierarchical, 0).unwrap();
    for m in &members {
        registry.add_member(&team_id, m.clone()).unwrap();
    }
    assert_eq!(registry.get(&team_id).unwrap().members.len(), 5);

    let member_mailboxes: Vec<_> = members.iter().map(|m| bus.register(m.clone()).unwrap()).collect();

    let driver = ConsensusDriver::new(bus.clone(), clock.clone());
    let proposal = driver.open("structure:flat", serde_json::json!({"formation": "flat"}), 0.66, members.clone(), 10_000);
    driver.broadcast(leader.clone(), &proposal).unwrap();
    for mailbox in &member_mailboxes {
        mailbox.recv().await;
    }

    let mut proposal = proposal;
    for voter in &members[..2] {
        let msg = vote_message(voter.clone(), proposal.id.as_str(), "positive");
        driver.ingest_vote(&mut proposal, &msg);
    }
    assert_eq!(proposal.votes.len(), 2);
    assert!((proposal.ratio() - 0.5).abs() < 1e-9);

    // Two outstanding votes could still reach 1.0, so the proposal is not
    // yet decided -- it must stay pending right up to the deadline.
    assert_eq!(proposal.resolve(9_999), ConsensusStatus::Pending);
    assert_eq!(proposal.resolve(10_000), ConsensusStatus::Expired);

    driver.record_resolution(store.as_ref(), &proposal).unwrap();
    let events = store.get_events(&proposal.id.to_string()).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, "consensus.expired");

    // Decision not applied: the team's formation is untouched.
    assert_eq!(registry.get(&team_id).unwrap().formation, Formation::Hierarchical);

    // The task gated on this proposal's outcome is cancelled and retried
    // rather than left dangling; the original goal text survives unchanged
    // on the new attempt.
    let scheduler =
        Scheduler::with_clock(AgentId::new("system", "hive"), bus.clone(), Arc::clone(&store), SchedulerConfig::default(), clock.clone());
    scheduler.agents().upsert_profile(swarm_core::AgentProfile::new(leader.clone(), swarm_core::AgentType::Coordinator, 0));
    let tasks = scheduler.submit_task("adopt flat formation", "auto", Priority::Normal).unwrap();
    let task_id = tasks[0].id.clone();
    let original_description = tasks[0].description.clone();

    scheduler.assign_ready().unwrap();
    scheduler.cancel_task(&task_id).unwrap();
    assert_eq!(scheduler.get_status(&task_id), Some(swarm_core::TaskStatus::Cancelled));

    let retried = scheduler.retry_task(&task_id).unwrap();
    assert_eq!(retried.retry_of, Some(task_id.clone()));
    assert_eq!(retried.description, original_description);
}
