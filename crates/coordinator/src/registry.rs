// SPDX-License-Identifier: MIT

//! Team CRUD and the reverse `agent -> team` index (spec §4.E "Team
//! lifecycle"). Enforces the one-team-per-agent invariant: an agent already
//! claimed by a team cannot be added to another until it is removed from the
//! first.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use swarm_core::{AgentId, AgentProfile, Formation, SwarmError, Task, TaskId, Team, TeamId, TeamStatus};

#[derive(Default)]
struct Inner {
    teams: BTreeMap<TeamId, Team>,
    /// `agent address -> team` reverse index, enforcing one team per agent.
    agent_teams: BTreeMap<String, TeamId>,
}

/// In-memory team registry. Durable persistence of team state is the
/// caller's responsibility (via `swarm-store`), same split as the bus's
/// mailboxes: this type only holds the authoritative live view.
#[derive(Default)]
pub struct TeamRegistry {
    inner: RwLock<Inner>,
}

impl TeamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `createTeam`: creates a team led by `leader`, which becomes its first
    /// member. Fails if `leader` already belongs to a team.
    pub fn create_team(
        &self,
        name: impl Into<String>,
        leader: AgentId,
        formation: Formation,
        created_at_epoch_ms: u64,
    ) -> Result<TeamId, SwarmError> {
        let mut inner = self.inner.write();
        if inner.agent_teams.contains_key(&leader.address()) {
            return Err(SwarmError::Validation(format!("agent {leader} already belongs to a team")));
        }
        let team = Team::new(name, leader.clone(), formation, created_at_epoch_ms);
        let id = team.id.clone();
        inner.agent_teams.insert(leader.address(), id.clone());
        inner.teams.insert(id.clone(), team);
        Ok(id)
    }

    /// `addMember`: fails if `agent` already belongs to any team (including
    /// `team_id` itself) or if `team_id` does not exist.
    pub fn add_member(&self, team_id: &TeamId, agent: AgentId) -> Result<(), SwarmError> {
        let mut inner = self.inner.write();
        if inner.agent_teams.contains_key(&agent.address()) {
            return Err(SwarmError::Validation(format!("agent {agent} already belongs to a team")));
        }
        let team = inner
            .teams
            .get_mut(team_id)
            .ok_or_else(|| SwarmError::NotFound(format!("team {team_id} not found")))?;
        team.members.push(agent.clone());
        inner.agent_teams.insert(agent.address(), team_id.clone());
        Ok(())
    }

    /// `removeMember`: if the team becomes empty, it transitions to
    /// `Disbanded` to preserve `Team::invariant_holds`.
    pub fn remove_member(&self, team_id: &TeamId, agent: &AgentId) -> Result<(), SwarmError> {
        let mut inner = self.inner.write();
        let team = inner
            .teams
            .get_mut(team_id)
            .ok_or_else(|| SwarmError::NotFound(format!("team {team_id} not found")))?;
        let before = team.members.len();
        team.members.retain(|m| m != agent);
        if team.members.len() == before {
            return Err(SwarmError::NotFound(format!("agent {agent} is not a member of team {team_id}")));
        }
        if team.members.is_empty() {
            team.status = TeamStatus::Disbanded;
        }
        inner.agent_teams.remove(&agent.address());
        Ok(())
    }

    /// `assignGoal`: appends a goal task id to the team's goal list and, if
    /// the team was still `Forming`, promotes it to `Active`.
    pub fn assign_goal(&self, team_id: &TeamId, task: &Task) -> Result<(), SwarmError> {
        let mut inner = self.inner.write();
        let team = inner
            .teams
            .get_mut(team_id)
            .ok_or_else(|| SwarmError::NotFound(format!("team {team_id} not found")))?;
        team.goals.push(task.id.clone());
        if team.status == TeamStatus::Forming {
            team.status = TeamStatus::Active;
        }
        Ok(())
    }

    /// `disbandTeam`: evicts every member from the reverse index and removes
    /// the team record entirely (spec §4.E: "removes the team record"; spec
    /// §8 scenario 6: `T` absent from `listTeams`). Returns the member list
    /// at the moment of disband so the caller can still notify former
    /// members with an `INFORM` after the record is gone.
    pub fn disband_team(&self, team_id: &TeamId) -> Result<Vec<AgentId>, SwarmError> {
        let mut inner = self.inner.write();
        let mut team = inner
            .teams
            .remove(team_id)
            .ok_or_else(|| SwarmError::NotFound(format!("team {team_id} not found")))?;
        let members = std::mem::take(&mut team.members);
        for member in &members {
            inner.agent_teams.remove(&member.address());
        }
        Ok(members)
    }

    pub fn get(&self, team_id: &TeamId) -> Option<Team> {
        self.inner.read().teams.get(team_id).cloned()
    }

    pub fn team_of(&self, agent: &AgentId) -> Option<TeamId> {
        self.inner.read().agent_teams.get(&agent.address()).cloned()
    }

    pub fn all(&self) -> Vec<Team> {
        self.inner.read().teams.values().cloned().collect()
    }

    /// `findCapableTeams` (spec §6): every live (non-disbanded) team at
    /// least one of whose members covers each capability in `required`,
    /// each capability matched by *some* member rather than requiring one
    /// member to cover all of them (a team is a pool, not a single agent).
    /// `profiles` is consulted by `AgentId` address; members with no
    /// matching profile contribute no capabilities.
    pub fn find_capable_teams(&self, required: &[String], profiles: &[AgentProfile]) -> Vec<TeamId> {
        let by_address: BTreeMap<String, &AgentProfile> =
            profiles.iter().map(|p| (p.id.address(), p)).collect();
        self.inner
            .read()
            .teams
            .values()
            .filter(|team| team.status != TeamStatus::Disbanded)
            .filter(|team| {
                required.iter().all(|cap| {
                    team.members
                        .iter()
                        .any(|m| by_address.get(&m.address()).map(|p| p.capabilities.contains_key(cap)).unwrap_or(false))
                })
            })
            .map(|team| team.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id_seed: &str) -> Task {
        let mut t = Task::new(format!("goal {id_seed}"), "generic", 0);
        t.id = TaskId::new();
        t
    }

    #[test]
    fn create_team_registers_leader_in_reverse_index() {
        let registry = TeamRegistry::new();
        let leader = AgentId::new("ns", "leader");
        let team_id = registry.create_team("alpha", leader.clone(), Formation::Dynamic, 0).unwrap();
        assert_eq!(registry.team_of(&leader), Some(team_id.clone()));
        assert_eq!(registry.get(&team_id).unwrap().members, vec![leader]);
    }

    #[test]
    fn agent_cannot_join_two_teams() {
        let registry = TeamRegistry::new();
        let leader = AgentId::new("ns", "leader");
        let team_a = registry.create_team("alpha", leader.clone(), Formation::Dynamic, 0).unwrap();
        let team_b = registry.create_team("beta", AgentId::new("ns", "other"), Formation::Dynamic, 0).unwrap();

        let err = registry.add_member(&team_b, leader.clone()).unwrap_err();
        assert!(matches!(err, SwarmError::Validation(_)));
        assert_eq!(registry.team_of(&leader), Some(team_a));
    }

    #[test]
    fn remove_last_member_disbands_team() {
        let registry = TeamRegistry::new();
        let leader = AgentId::new("ns", "leader");
        let team_id = registry.create_team("alpha", leader.clone(), Formation::Dynamic, 0).unwrap();
        registry.remove_member(&team_id, &leader).unwrap();

        let team = registry.get(&team_id).unwrap();
        assert!(team.invariant_holds());
        assert_eq!(team.status, TeamStatus::Disbanded);
        assert_eq!(registry.team_of(&leader), None);
    }

    #[test]
    fn disband_releases_every_member_from_reverse_index() {
        let registry = TeamRegistry::new();
        let leader = AgentId::new("ns", "leader");
        let member = AgentId::new("ns", "member");
        let team_id = registry.create_team("alpha", leader.clone(), Formation::Dynamic, 0).unwrap();
        registry.add_member(&team_id, member.clone()).unwrap();

        let former_members = registry.disband_team(&team_id).unwrap();

        assert_eq!(former_members, vec![leader.clone(), member.clone()]);
        assert_eq!(registry.team_of(&leader), None);
        assert_eq!(registry.team_of(&member), None);
        assert_eq!(registry.get(&team_id), None, "disbanded team record must be removed, not merely marked");
        assert!(registry.all().iter().all(|t| t.id != team_id));
    }

    #[test]
    fn assign_goal_promotes_forming_team_to_active() {
        let registry = TeamRegistry::new();
        let leader = AgentId::new("ns", "leader");
        let team_id = registry.create_team("alpha", leader, Formation::Dynamic, 0).unwrap();
        registry.assign_goal(&team_id, &task("g1")).unwrap();
        assert_eq!(registry.get(&team_id).unwrap().status, TeamStatus::Active);
    }

    #[test]
    fn find_capable_teams_matches_on_member_union_and_excludes_disbanded() {
        use swarm_core::AgentType;

        let registry = TeamRegistry::new();
        let leader = AgentId::new("ns", "leader");
        let tester = AgentId::new("ns", "tester");
        let team_id = registry.create_team("alpha", leader.clone(), Formation::Dynamic, 0).unwrap();
        registry.add_member(&team_id, tester.clone()).unwrap();

        let profiles = vec![
            AgentProfile::new(leader.clone(), AgentType::Coder, 0).with_capability("programming", 1.0),
            AgentProfile::new(tester.clone(), AgentType::Tester, 1).with_capability("testing", 1.0),
        ];

        let hits = registry.find_capable_teams(&["programming".to_string(), "testing".to_string()], &profiles);
        assert_eq!(hits, vec![team_id.clone()]);

        // A capability nobody on the team has excludes it.
        let miss = registry.find_capable_teams(&["devops".to_string()], &profiles);
        assert!(miss.is_empty());

        // A disbanded team is never a candidate, even if its former
        // members' profiles would otherwise satisfy the requirement.
        registry.disband_team(&team_id).unwrap();
        let after_disband = registry.find_capable_teams(&["programming".to_string()], &profiles);
        assert!(after_disband.is_empty());
    }

    #[test]
    fn operations_on_unknown_team_are_not_found() {
        let registry = TeamRegistry::new();
        let bogus = TeamId::new();
        assert!(matches!(registry.add_member(&bogus, AgentId::new("ns", "a")), Err(SwarmError::NotFound(_))));
        assert!(matches!(registry.disband_team(&bogus), Err(SwarmError::NotFound(_))));
    }
}
