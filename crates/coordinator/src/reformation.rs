// SPDX-License-Identifier: MIT

//! `optimizeTeamFormation` (spec §4.E "Reformation"): periodically
//! rescores a team's formation against its current membership and goal
//! complexity, and proposes a change only when it clears a minimum gain.

use crate::strategy::{select_strategy, built_in_strategies, StrategyContext};
use std::collections::BTreeSet;
use swarm_core::{AgentProfile, Formation, Team};

/// The gain a candidate formation must clear over the current one before
/// reformation bothers restructuring (spec §4.E: "apply only if the gain
/// exceeds 0.1").
pub const MIN_REFORMATION_GAIN: f64 = 0.1;

fn unique_capability_count(members: &[AgentProfile]) -> usize {
    members.iter().flat_map(|p| p.capabilities.keys()).collect::<BTreeSet<_>>().len()
}

fn formation_score(formation: Formation, ctx: &StrategyContext) -> f64 {
    built_in_strategies()
        .into_iter()
        .find(|s| s.formation() == formation)
        .map(|s| s.evaluate(ctx))
        .unwrap_or(0.0)
}

/// Returns `Some(new_formation)` if reformation should occur, else `None`.
/// `member_profiles` must correspond to `team.members` (capability lookups
/// are by membership, not identity matching beyond that).
pub fn evaluate_reformation(team: &Team, member_profiles: &[AgentProfile], goal_complexity: f64) -> Option<Formation> {
    let ctx = StrategyContext {
        team_size: team.members.len(),
        complexity: goal_complexity,
        unique_capabilities: unique_capability_count(member_profiles),
    };
    let current_score = formation_score(team.formation, &ctx);
    let candidate = select_strategy(&ctx, Some(team.formation));
    if candidate == team.formation {
        return None;
    }
    let candidate_score = formation_score(candidate, &ctx);
    if candidate_score - current_score > MIN_REFORMATION_GAIN {
        Some(candidate)
    } else {
        None
    }
}
