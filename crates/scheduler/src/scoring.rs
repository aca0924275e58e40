// SPDX-License-Identifier: MIT

//! Per-candidate agent scoring for task assignment (spec §4.F "Agent
//! scoring"): 40% capability match, 30% historical success rate, 20%
//! `(1 - workload)`, 10% ML-heuristic domain/type affinity.

use swarm_core::{AgentProfile, Task};

#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub capability: f64,
    pub success: f64,
    pub workload: f64,
    pub ml_heuristic: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { capability: 0.4, success: 0.3, workload: 0.2, ml_heuristic: 0.1 }
    }
}

/// Average proficiency across a task's required capabilities; missing
/// capabilities contribute `0`. Tasks with no stated requirements score a
/// neutral `0.5`, matching the coordinator's own convention
/// (`swarm_coordinator::score_agent_for_task`).
pub fn capability_match(profile: &AgentProfile, task: &Task) -> f64 {
    if task.required_capabilities.is_empty() {
        return 0.5;
    }
    let sum: f64 = task.required_capabilities.iter().map(|cap| profile.capabilities.get(cap).copied().unwrap_or(0.0)).sum();
    (sum / task.required_capabilities.len() as f64).clamp(0.0, 1.0)
}

/// Domain keywords the objective decomposer's task types surface, weighted
/// by how strongly each hints at a given agent type.
const DOMAIN_AFFINITY: &[(&str, &[&str])] = &[
    ("analysis", &["analyst", "researcher"]),
    ("research", &["researcher", "analyst"]),
    ("design", &["architect"]),
    ("implementation", &["coder"]),
    ("testing", &["tester", "reviewer"]),
    ("documentation", &["documenter"]),
    ("reporting", &["analyst", "documenter"]),
    ("synthesis", &["researcher", "analyst"]),
    ("data_collection", &["researcher"]),
    ("literature_review", &["researcher"]),
    ("experimentation", &["researcher", "analyst"]),
];

/// 10% component: exact task-type/agent-type match plus a softer
/// domain-keyword affinity over the task's type tag, both folded into a
/// single `[0,1]` score (spec §4.F: "ML-heuristic weighting by domain
/// keywords and agent type affinity").
pub fn ml_heuristic(profile: &AgentProfile, task: &Task) -> f64 {
    let type_str = profile.agent_type.to_string();
    let exact_match = if type_str == task.task_type { 1.0 } else { 0.0 };
    let affinity = DOMAIN_AFFINITY
        .iter()
        .find(|(keyword, _)| task.task_type.contains(keyword))
        .map(|(_, types)| if types.contains(&type_str.as_str()) { 1.0 } else { 0.0 })
        .unwrap_or(0.0);
    (0.5 * exact_match + 0.5 * affinity).clamp(0.0, 1.0)
}

/// Combined weighted score for one `(agent, task)` pair; `success_rate`
/// comes from the scheduler's `AgentRegistry`.
pub fn score_candidate(profile: &AgentProfile, task: &Task, success_rate: f64, weights: &ScoreWeights) -> f64 {
    let capability = capability_match(profile, task);
    let workload_component = 1.0 - (profile.workload as f64 / 100.0);
    let ml = ml_heuristic(profile, task);
    weights.capability * capability
        + weights.success * success_rate.clamp(0.0, 1.0)
        + weights.workload * workload_component
        + weights.ml_heuristic * ml
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::{AgentId, AgentType, Priority};

    fn profile(agent_type: AgentType, workload: u8) -> AgentProfile {
        let mut p = AgentProfile::new(AgentId::new("ns", "a"), agent_type, 0);
        p.workload = workload;
        p
    }

    fn task(task_type: &str) -> Task {
        let mut t = Task::new("x", task_type, 0);
        t.priority = Priority::Normal;
        t
    }

    #[test]
    fn domain_keyword_affinity_rewards_matching_type() {
        let analyst = profile(AgentType::Analyst, 0);
        let coder = profile(AgentType::Coder, 0);
        let t = task("analysis");
        assert!(ml_heuristic(&analyst, &t) > ml_heuristic(&coder, &t));
    }

    #[test]
    fn lower_workload_increases_total_score() {
        let busy = profile(AgentType::Coder, 90);
        let idle = profile(AgentType::Coder, 0);
        let t = task("implementation");
        let weights = ScoreWeights::default();
        assert!(score_candidate(&idle, &t, 0.8, &weights) > score_candidate(&busy, &t, 0.8, &weights));
    }

    #[test]
    fn missing_required_capability_drags_score_down() {
        let mut t = task("generic");
        t.required_capabilities.insert("programming".into());
        let no_skill = profile(AgentType::Coder, 0);
        let weights = ScoreWeights::default();
        let with_skill = profile(AgentType::Coder, 0).with_capability("programming", 1.0);
        assert!(score_candidate(&with_skill, &t, 0.8, &weights) > score_candidate(&no_skill, &t, 0.8, &weights));
    }
}
