// SPDX-License-Identifier: MIT

//! End-to-end scenario 6 (spec §8): disbanding a team releases every
//! member from the `agent -> team` reverse index in the same transaction,
//! removes the team record itself (spec §4.E: "removes the team record"),
//! notifies former members with an `INFORM`, and a freed member can
//! immediately join a different team.

use swarm_bus::MessageBus;
use swarm_core::{topics, AgentId, Formation, MessageType};
use swarm_coordinator::{disband_team_and_notify, TeamRegistry};

#[tokio::test]
async fn disbanding_a_team_frees_every_member_for_reassignment() {
    let bus = MessageBus::new();
    let registry = TeamRegistry::new();
    let leader = AgentId::new("team", "leader");
    let members: Vec<AgentId> = (1..=3).map(|i| AgentId::new("team", format!("m{i}"))).collect();

    bus.register(leader.clone()).unwrap();
    let member_mailboxes: Vec<_> = members.iter().map(|m| bus.register(m.clone()).unwrap()).collect();

    let team_id = registry.create_team("alpha", leader.clone(), Formation::Hierarchical, 0).unwrap();
    for m in &members {
        registry.add_member(&team_id, m.clone()).unwrap();
    }
    assert_eq!(registry.get(&team_id).unwrap().members.len(), 4);

    let former_members = disband_team_and_notify(&bus, &registry, leader.clone(), &team_id, "objective complete", 0).unwrap();
    assert_eq!(former_members.len(), 4);

    // Every former member, including the leader, is gone from the reverse
    // index -- not just removed from the team's own member list.
    assert_eq!(registry.team_of(&leader), None);
    for m in &members {
        assert_eq!(registry.team_of(m), None);
    }

    // The team record is removed entirely, not merely marked disbanded.
    assert!(registry.get(&team_id).is_none());
    assert!(registry.all().iter().all(|t| t.id != team_id), "T must be absent from listTeams");

    // Every former member (other than the notifying leader) received the
    // disband INFORM.
    for mailbox in &member_mailboxes {
        let msg = mailbox.recv().await;
        assert_eq!(msg.content.topic, topics::TEAM_DISBANDED);
        assert_eq!(msg.kind, MessageType::Inform);
    }

    // A freed former member can join an entirely new team right away.
    let new_leader = members[0].clone();
    let second_team = registry.create_team("beta", new_leader.clone(), Formation::Flat, 1).unwrap();
    assert_eq!(registry.team_of(&new_leader), Some(second_team.clone()));

    let second_recruit = members[1].clone();
    registry.add_member(&second_team, second_recruit.clone()).unwrap();
    assert_eq!(registry.team_of(&second_recruit), Some(second_team));

    // The original leader is still unaffiliated.
    assert_eq!(registry.team_of(&leader), None);
}
