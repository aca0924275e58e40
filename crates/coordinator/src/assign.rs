// SPDX-License-Identifier: MIT

//! Capability-matched task assignment (spec §4.E "Capability matching" /
//! "Task assignment").

use swarm_core::{AgentProfile, Task};

/// Score an agent for a task: average proficiency across the task's
/// required capabilities (missing capabilities score `0`), plus a `0.2`
/// bonus when the agent's type string matches the task's type tag.
/// Unavailable agents (per `AgentLifecycle::is_available`) are never
/// scored by [`best_agent_for_task`] but `score_agent_for_task` itself is a
/// pure function so callers can still inspect it directly.
pub fn score_agent_for_task(profile: &AgentProfile, task: &Task) -> f64 {
    let base = if task.required_capabilities.is_empty() {
        0.5
    } else {
        let sum: f64 = task
            .required_capabilities
            .iter()
            .map(|cap| profile.capabilities.get(cap).copied().unwrap_or(0.0))
            .sum();
        sum / task.required_capabilities.len() as f64
    };
    let bonus = if profile.agent_type.to_string() == task.task_type { 0.2 } else { 0.0 };
    (base + bonus).clamp(0.0, 1.0)
}

/// Pick the best-scoring available candidate. Ties broken by lower reported
/// workload, then by earliest registration (spec §4.E "tie-break").
pub fn best_agent_for_task<'a>(task: &Task, candidates: &'a [AgentProfile]) -> Option<&'a AgentProfile> {
    candidates
        .iter()
        .filter(|p| p.is_available())
        .max_by(|a, b| {
            let score_a = score_agent_for_task(a, task);
            let score_b = score_agent_for_task(b, task);
            score_a
                .partial_cmp(&score_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.workload.cmp(&a.workload))
                .then_with(|| b.registered_at_epoch_ms.cmp(&a.registered_at_epoch_ms))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::{AgentId, AgentLifecycle, AgentType};

    fn profile(id: &str, agent_type: AgentType) -> AgentProfile {
        AgentProfile::new(AgentId::new("ns", id), agent_type, 0)
    }

    #[test]
    fn agent_type_match_adds_bonus() {
        let mut task = Task::new("ship it", "coder", 0);
        task.required_capabilities.insert("programming".into());
        let matching = profile("a1", AgentType::Coder).with_capability("programming", 0.5);
        let other = profile("a2", AgentType::Researcher).with_capability("programming", 0.5);
        assert!(score_agent_for_task(&matching, &task) > score_agent_for_task(&other, &task));
    }

    #[test]
    fn missing_capability_scores_zero_contribution() {
        let mut task = Task::new("x", "generic", 0);
        task.required_capabilities.insert("programming".into());
        task.required_capabilities.insert("testing".into());
        let half = profile("a1", AgentType::Coder).with_capability("programming", 1.0);
        assert_eq!(score_agent_for_task(&half, &task), 0.5);
    }

    #[test]
    fn unavailable_agents_are_excluded_from_selection() {
        let task = Task::new("x", "generic", 0);
        let mut busy = profile("a1", AgentType::Coder);
        busy.lifecycle = AgentLifecycle::Unresponsive;
        let idle = profile("a2", AgentType::Researcher);
        let best = best_agent_for_task(&task, &[busy, idle.clone()]).unwrap();
        assert_eq!(best.id, idle.id);
    }

    #[test]
    fn tie_breaks_by_lower_workload_then_earlier_registration() {
        let task = Task::new("x", "generic", 0);
        let mut a = profile("a1", AgentType::Coder);
        a.workload = 80;
        let mut b = profile("a2", AgentType::Coder);
        b.workload = 10;
        let best = best_agent_for_task(&task, &[a, b.clone()]).unwrap();
        assert_eq!(best.id, b.id);
    }

    #[test]
    fn no_available_candidates_returns_none() {
        let task = Task::new("x", "generic", 0);
        let mut only = profile("a1", AgentType::Coder);
        only.lifecycle = AgentLifecycle::Offline;
        assert!(best_agent_for_task(&task, &[only]).is_none());
    }
}
