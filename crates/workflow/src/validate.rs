// SPDX-License-Identifier: MIT

//! Structural validation of a `WorkflowDefinition` (spec §4.G "Validation"):
//! every edge references an existing node, at least one `Start` and one
//! `End` node exist, and every cycle passes through a `Loop` node (loops are
//! the only sanctioned back-edge; anything else is a malformed DAG).

use std::collections::{HashMap, HashSet};
use swarm_core::{NodeKind, SwarmError, WorkflowDefinition};

pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), SwarmError> {
    if def.start_nodes().is_empty() {
        return Err(SwarmError::Validation("workflow has no Start node".into()));
    }
    if def.end_nodes().is_empty() {
        return Err(SwarmError::Validation("workflow has no End node".into()));
    }

    let node_ids: HashSet<&str> = def.nodes.iter().map(|n| n.id.as_str()).collect();
    for edge in &def.edges {
        if !node_ids.contains(edge.from.as_str()) {
            return Err(SwarmError::Validation(format!("edge references unknown source node {}", edge.from)));
        }
        if !node_ids.contains(edge.to.as_str()) {
            return Err(SwarmError::Validation(format!("edge references unknown target node {}", edge.to)));
        }
    }

    let loop_nodes: HashSet<&str> = def
        .nodes
        .iter()
        .filter(|n| matches!(n.kind, NodeKind::Loop { .. }))
        .map(|n| n.id.as_str())
        .collect();

    if let Some(cycle) = find_cycle(def) {
        if !cycle.iter().any(|id| loop_nodes.contains(id.as_str())) {
            return Err(SwarmError::Validation(format!(
                "cycle {cycle:?} does not pass through a Loop node"
            )));
        }
    }

    Ok(())
}

/// Depth-first cycle detection; returns one offending cycle (as node ids) if
/// any exists, else `None`.
fn find_cycle(def: &WorkflowDefinition) -> Option<Vec<String>> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &def.edges {
        adjacency.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack: Vec<&str> = Vec::new();

    fn visit<'a>(
        node: &'a str,
        adjacency: &HashMap<&'a str, Vec<&'a str>>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        if let Some(Mark::Visiting) = marks.get(node) {
            let start = stack.iter().position(|n| *n == node).unwrap_or(0);
            return Some(stack[start..].iter().map(|s| s.to_string()).collect());
        }
        if marks.get(node) == Some(&Mark::Done) {
            return None;
        }
        marks.insert(node, Mark::Visiting);
        stack.push(node);
        if let Some(neighbors) = adjacency.get(node) {
            for next in neighbors {
                if let Some(cycle) = visit(next, adjacency, marks, stack) {
                    return Some(cycle);
                }
            }
        }
        stack.pop();
        marks.insert(node, Mark::Done);
        None
    }

    for node in def.nodes.iter().map(|n| n.id.as_str()) {
        if !marks.contains_key(node) {
            if let Some(cycle) = visit(node, &adjacency, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::{Condition, Edge, Node, WorkflowDefId};
    use std::collections::BTreeMap;

    fn def(nodes: Vec<Node>, edges: Vec<Edge>) -> WorkflowDefinition {
        WorkflowDefinition { id: WorkflowDefId::new(), version: 1, nodes, edges, variables: BTreeMap::new() }
    }

    #[test]
    fn missing_start_node_is_rejected() {
        let d = def(vec![Node { id: "end".into(), kind: NodeKind::End }], vec![]);
        assert!(validate_definition(&d).is_err());
    }

    #[test]
    fn edge_to_unknown_node_is_rejected() {
        let d = def(
            vec![Node { id: "start".into(), kind: NodeKind::Start }, Node { id: "end".into(), kind: NodeKind::End }],
            vec![Edge { from: "start".into(), to: "ghost".into(), condition: None, is_default: false }],
        );
        assert!(validate_definition(&d).is_err());
    }

    #[test]
    fn cycle_through_loop_node_is_accepted() {
        let d = def(
            vec![
                Node { id: "start".into(), kind: NodeKind::Start },
                Node {
                    id: "loop".into(),
                    kind: NodeKind::Loop { condition: Condition::Expression { expr: "true".into() }, max_iterations: 5 },
                },
                Node { id: "body".into(), kind: NodeKind::Task { topic: "work".into() } },
                Node { id: "end".into(), kind: NodeKind::End },
            ],
            vec![
                Edge { from: "start".into(), to: "loop".into(), condition: None, is_default: false },
                Edge { from: "loop".into(), to: "body".into(), condition: None, is_default: false },
                Edge { from: "body".into(), to: "loop".into(), condition: None, is_default: false },
                Edge { from: "loop".into(), to: "end".into(), condition: None, is_default: true },
            ],
        );
        assert!(validate_definition(&d).is_ok());
    }

    #[test]
    fn cycle_without_loop_node_is_rejected() {
        let d = def(
            vec![
                Node { id: "start".into(), kind: NodeKind::Start },
                Node { id: "a".into(), kind: NodeKind::Task { topic: "a".into() } },
                Node { id: "b".into(), kind: NodeKind::Task { topic: "b".into() } },
                Node { id: "end".into(), kind: NodeKind::End },
            ],
            vec![
                Edge { from: "start".into(), to: "a".into(), condition: None, is_default: false },
                Edge { from: "a".into(), to: "b".into(), condition: None, is_default: false },
                Edge { from: "b".into(), to: "a".into(), condition: None, is_default: false },
                Edge { from: "b".into(), to: "end".into(), condition: None, is_default: false },
            ],
        );
        assert!(validate_definition(&d).is_err());
    }
}
