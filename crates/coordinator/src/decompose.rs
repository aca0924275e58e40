// SPDX-License-Identifier: MIT

//! Goal decomposition and capability matching (spec §4.E "Goal
//! decomposition" / "Capability matching").

use regex::Regex;
use std::sync::OnceLock;
use swarm_core::{Priority, Task, TaskId};

const COMPLEXITY_VERBS: &[&str] =
    &["analyze", "research", "design", "implement", "optimize", "integrate", "coordinate", "synthesize"];

const PHASE_VERBS: &[&str] = &["research", "design", "implement", "test"];

/// `None` only if `COMPLEXITY_VERBS` were ever edited into an invalid
/// pattern; callers degrade to zero verb hits rather than panic.
fn complexity_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(r"(?i)\b({})\b", COMPLEXITY_VERBS.join("|"));
        Regex::new(&pattern).ok()
    })
    .as_ref()
}

/// Complexity score in `[0,1]` from the description's verb density plus a
/// per-constraint/sub-goal/dependency surcharge (spec §4.E).
pub fn complexity_score(
    description: &str,
    constraints: usize,
    sub_goals: usize,
    dependencies: usize,
) -> f64 {
    let verb_hits = complexity_regex().map(|re| re.find_iter(description).count()).unwrap_or(0);
    let word_count = description.split_whitespace().count().max(1);
    let verb_density = (verb_hits as f64 / word_count as f64) * 4.0;
    let score = verb_density
        + 0.05 * constraints as f64
        + 0.1 * sub_goals as f64
        + 0.05 * dependencies as f64;
    score.clamp(0.0, 1.0)
}

/// One of the phases or parallel tasks a goal decomposes into, before it is
/// materialized as a `Task` with a concrete id/timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub description: String,
    pub task_type: String,
    pub depends_on_previous: bool,
}

/// Pure function of `(description, constraints, sub_goals, dependencies)`:
/// decomposition is idempotent on the same input (spec §4.E).
pub fn decompose(
    description: &str,
    constraints: usize,
    sub_goals: usize,
    dependencies: usize,
) -> Vec<TaskSpec> {
    let complexity = complexity_score(description, constraints, sub_goals, dependencies);
    if complexity > 0.7 {
        phase_split(description)
    } else {
        parallel_split(description)
    }
}

/// `research -> design -> implement -> test`, each depending on the
/// previous. Tie-break: if none of those verbs appear in the description,
/// emit a single phase equal to the goal.
fn phase_split(description: &str) -> Vec<TaskSpec> {
    let lower = description.to_lowercase();
    let present: Vec<&str> = PHASE_VERBS.iter().copied().filter(|v| lower.contains(v)).collect();
    if present.is_empty() {
        return vec![TaskSpec { description: description.to_string(), task_type: "generic".into(), depends_on_previous: false }];
    }
    PHASE_VERBS
        .iter()
        .enumerate()
        .map(|(i, phase)| TaskSpec {
            description: format!("{phase}: {description}"),
            task_type: phase.to_string(),
            depends_on_previous: i > 0,
        })
        .collect()
}

const CONCERNS: &[&str] = &["data", "ui", "backend", "documentation"];

/// Orthogonal concerns split along `data / ui / backend / documentation`;
/// tasks within a concern are independent of each other.
fn parallel_split(description: &str) -> Vec<TaskSpec> {
    let lower = description.to_lowercase();
    let matched: Vec<&str> = CONCERNS.iter().copied().filter(|c| lower.contains(c)).collect();
    let concerns = if matched.is_empty() { vec!["generic"] } else { matched };
    concerns
        .into_iter()
        .map(|concern| TaskSpec {
            description: format!("{concern}: {description}"),
            task_type: concern.to_string(),
            depends_on_previous: false,
        })
        .collect()
}

/// Materialize a [`TaskSpec`] phase chain/parallel set into concrete `Task`s
/// with dependency edges wired per `depends_on_previous`.
pub fn materialize(specs: Vec<TaskSpec>, priority: Priority, now_epoch_ms: u64) -> Vec<Task> {
    let mut tasks = Vec::with_capacity(specs.len());
    let mut previous_id: Option<TaskId> = None;
    for spec in specs {
        let mut task = Task::new(spec.description, spec.task_type, now_epoch_ms);
        task.priority = priority;
        if spec.depends_on_previous {
            if let Some(prev) = &previous_id {
                task.dependencies.insert(prev.clone());
            }
        }
        previous_id = Some(task.id.clone());
        tasks.push(task);
    }
    tasks
}

/// Fixed keyword -> capability-set table (spec §4.E "Capability matching").
const KEYWORD_CAPABILITIES: &[(&str, &[&str])] = &[
    ("code", &["programming"]),
    ("implement", &["programming"]),
    ("ui", &["ui_design", "frontend_development"]),
    ("frontend", &["ui_design", "frontend_development"]),
    ("test", &["testing", "quality_assurance"]),
    ("research", &["research", "analysis"]),
    ("analyze", &["research", "analysis"]),
    ("design", &["architecture", "design"]),
    ("architect", &["architecture", "design"]),
    ("document", &["documentation"]),
    ("optimize", &["optimization", "performance_engineering"]),
    ("deploy", &["devops"]),
    ("data", &["data_engineering"]),
    ("backend", &["backend_development"]),
    ("integrate", &["integration"]),
    ("coordinate", &["coordination"]),
];

/// Required capabilities extracted from a free-text description via the
/// fixed keyword table. Order is deterministic (table order, deduplicated).
pub fn required_capabilities(description: &str) -> Vec<String> {
    let lower = description.to_lowercase();
    let mut seen = std::collections::BTreeSet::new();
    let mut result = Vec::new();
    for (keyword, caps) in KEYWORD_CAPABILITIES {
        if lower.contains(keyword) {
            for cap in *caps {
                if seen.insert(*cap) {
                    result.push(cap.to_string());
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_verb_density_short_description_is_low_complexity() {
        let score = complexity_score("fix typo", 0, 0, 0);
        assert!(score < 0.7, "expected low complexity, got {score}");
    }

    #[test]
    fn many_verbs_and_subgoals_push_complexity_above_threshold() {
        let score = complexity_score(
            "analyze research design implement optimize integrate coordinate synthesize",
            2,
            3,
            2,
        );
        assert!(score > 0.7, "expected high complexity, got {score}");
    }

    #[test]
    fn high_complexity_splits_into_four_dependent_phases() {
        let specs = decompose(
            "analyze research design implement optimize integrate coordinate synthesize",
            2,
            3,
            2,
        );
        assert_eq!(specs.len(), 4);
        assert!(!specs[0].depends_on_previous);
        assert!(specs[1].depends_on_previous);
        assert!(specs[2].depends_on_previous);
        assert!(specs[3].depends_on_previous);
    }

    #[test]
    fn low_complexity_splits_into_independent_parallel_concerns() {
        let specs = decompose("build the ui and backend", 0, 0, 0);
        assert!(specs.iter().all(|s| !s.depends_on_previous));
        assert!(specs.iter().any(|s| s.task_type == "ui"));
        assert!(specs.iter().any(|s| s.task_type == "backend"));
    }

    #[test]
    fn empty_description_yields_single_generic_task() {
        let specs = decompose("", 0, 0, 0);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].task_type, "generic");
    }

    #[test]
    fn decomposition_is_idempotent() {
        let a = decompose("implement the api", 1, 0, 0);
        let b = decompose("implement the api", 1, 0, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn materialize_wires_phase_dependencies() {
        let specs = decompose("research design implement test thoroughly and carefully", 1, 1, 1);
        let tasks = materialize(specs, Priority::Normal, 0);
        assert!(tasks.len() >= 2);
        for i in 1..tasks.len() {
            assert!(tasks[i].dependencies.contains(&tasks[i - 1].id));
        }
    }

    #[test]
    fn required_capabilities_maps_code_to_programming() {
        let caps = required_capabilities("please code a new endpoint");
        assert_eq!(caps, vec!["programming".to_string()]);
    }

    #[test]
    fn required_capabilities_dedupes_across_keywords() {
        let caps = required_capabilities("implement and code this");
        assert_eq!(caps, vec!["programming".to_string()]);
    }
}
