// SPDX-License-Identifier: MIT

//! Pure helpers the interpreter leans on: outgoing-edge selection (spec
//! §4.G "Decision": conditions evaluated in declaration order, `DEFAULT`
//! last-resort) and aggregate-merge arithmetic. Kept free of I/O so they can
//! be exercised directly without a bus or store.

use crate::expr::evaluate_condition;
use crate::handlers::HandlerRegistry;
use std::collections::{HashSet, VecDeque};
use swarm_core::{AggregateOp, SwarmError, WorkflowContext, WorkflowDefinition};

/// Pick the next node id leaving `node_id`: the first edge whose condition
/// (if any) evaluates true, else the `is_default` edge, else an error if
/// neither exists and there was at least one outgoing edge. Returns `None`
/// if `node_id` has no outgoing edges at all (an `End` node, typically).
pub fn select_next_edge(
    def: &WorkflowDefinition,
    node_id: &str,
    ctx: &WorkflowContext,
    handlers: &HandlerRegistry,
) -> Result<Option<String>, SwarmError> {
    let outgoing = def.outgoing(node_id);
    if outgoing.is_empty() {
        return Ok(None);
    }

    let mut default_edge = None;
    for edge in &outgoing {
        if edge.is_default {
            default_edge = Some(edge.to.clone());
            continue;
        }
        match &edge.condition {
            Some(condition) => {
                if evaluate_condition(condition, ctx, handlers)? {
                    return Ok(Some(edge.to.clone()));
                }
            }
            None => return Ok(Some(edge.to.clone())),
        }
    }
    match default_edge {
        Some(to) => Ok(Some(to)),
        None => Err(SwarmError::Validation(format!("no outgoing edge matched and no default edge from {node_id}"))),
    }
}

/// The non-default (loop body) edge leaving a `Loop` node, if any.
pub fn loop_body_edge(def: &WorkflowDefinition, node_id: &str) -> Option<String> {
    def.outgoing(node_id).into_iter().find(|e| !e.is_default).map(|e| e.to.clone())
}

/// The default (loop exit) edge leaving a `Loop` node.
pub fn loop_exit_edge(def: &WorkflowDefinition, node_id: &str) -> Option<String> {
    def.outgoing(node_id).into_iter().find(|e| e.is_default).map(|e| e.to.clone())
}

/// The first node reachable from every branch of a `Parallel` node (spec
/// §4.G "Parallel": control proceeds to the first common descendant of all
/// branches once each has run). `None` if the branches never reconverge, in
/// which case the caller falls back to the `Parallel` node's own outgoing
/// edge.
pub fn join_node(def: &WorkflowDefinition, branches: &[String]) -> Option<String> {
    let first = branches.first()?;
    let reachable: Vec<HashSet<String>> = branches.iter().map(|b| reachable_from(def, b)).collect();
    bfs_order(def, first).into_iter().find(|candidate| reachable.iter().all(|set| set.contains(candidate)))
}

fn reachable_from(def: &WorkflowDefinition, start: &str) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    seen.insert(start.to_string());
    queue.push_back(start.to_string());
    while let Some(id) = queue.pop_front() {
        for edge in def.outgoing(&id) {
            if seen.insert(edge.to.clone()) {
                queue.push_back(edge.to.clone());
            }
        }
    }
    seen
}

/// Breadth-first visiting order from `start`, used to pick the nearest
/// (rather than merely any) common descendant deterministically.
fn bfs_order(def: &WorkflowDefinition, start: &str) -> Vec<String> {
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    seen.insert(start.to_string());
    queue.push_back(start.to_string());
    while let Some(id) = queue.pop_front() {
        order.push(id.clone());
        for edge in def.outgoing(&id) {
            if seen.insert(edge.to.clone()) {
                queue.push_back(edge.to.clone());
            }
        }
    }
    order
}

/// Combine the named `node_outputs` entries per `AggregateOp` (spec §4.G
/// "Aggregate"). Non-numeric entries under `Sum`/`Average` are treated as
/// `0` rather than failing the node -- an aggregate over heterogeneous
/// upstream outputs degrades gracefully instead of aborting the instance.
pub fn aggregate_merge(inputs: &[String], op: AggregateOp, ctx: &WorkflowContext) -> serde_json::Value {
    let values: Vec<&serde_json::Value> = inputs.iter().filter_map(|id| ctx.node_outputs.get(id)).collect();
    match op {
        AggregateOp::Concat => {
            serde_json::Value::Array(values.into_iter().cloned().collect())
        }
        AggregateOp::Merge => {
            let mut merged = serde_json::Map::new();
            for v in values {
                if let Some(obj) = v.as_object() {
                    for (k, val) in obj {
                        merged.insert(k.clone(), val.clone());
                    }
                }
            }
            serde_json::Value::Object(merged)
        }
        AggregateOp::Sum => {
            let sum: f64 = values.iter().filter_map(|v| v.as_f64()).sum();
            serde_json::json!(sum)
        }
        AggregateOp::Average => {
            let nums: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
            if nums.is_empty() {
                serde_json::json!(0.0)
            } else {
                serde_json::json!(nums.iter().sum::<f64>() / nums.len() as f64)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::{Condition, Edge, Node, NodeKind, WorkflowDefId};
    use std::collections::BTreeMap;

    fn def_with_decision() -> WorkflowDefinition {
        WorkflowDefinition {
            id: WorkflowDefId::new(),
            version: 1,
            nodes: vec![
                Node { id: "d".into(), kind: NodeKind::Decision },
                Node { id: "yes".into(), kind: NodeKind::End },
                Node { id: "no".into(), kind: NodeKind::End },
            ],
            edges: vec![
                Edge {
                    from: "d".into(),
                    to: "yes".into(),
                    condition: Some(Condition::Expression { expr: "flag == true".into() }),
                    is_default: false,
                },
                Edge { from: "d".into(), to: "no".into(), condition: None, is_default: true },
            ],
            variables: BTreeMap::new(),
        }
    }

    #[test]
    fn matching_condition_wins_over_default() {
        let def = def_with_decision();
        let handlers = HandlerRegistry::new();
        let mut ctx = WorkflowContext::default();
        ctx.variables.insert("flag".into(), serde_json::json!(true));
        assert_eq!(select_next_edge(&def, "d", &ctx, &handlers).unwrap(), Some("yes".to_string()));
    }

    #[test]
    fn no_match_falls_back_to_default() {
        let def = def_with_decision();
        let handlers = HandlerRegistry::new();
        let mut ctx = WorkflowContext::default();
        ctx.variables.insert("flag".into(), serde_json::json!(false));
        assert_eq!(select_next_edge(&def, "d", &ctx, &handlers).unwrap(), Some("no".to_string()));
    }

    #[test]
    fn terminal_node_has_no_outgoing_edge() {
        let def = def_with_decision();
        let handlers = HandlerRegistry::new();
        let ctx = WorkflowContext::default();
        assert_eq!(select_next_edge(&def, "yes", &ctx, &handlers).unwrap(), None);
    }

    fn def_with_parallel_join() -> WorkflowDefinition {
        WorkflowDefinition {
            id: WorkflowDefId::new(),
            version: 1,
            nodes: vec![
                Node { id: "fan".into(), kind: NodeKind::Parallel { branches: vec!["a".into(), "b".into()] } },
                Node { id: "a".into(), kind: NodeKind::Transform { handler_id: "noop".into() } },
                Node { id: "b".into(), kind: NodeKind::Transform { handler_id: "noop".into() } },
                Node { id: "join".into(), kind: NodeKind::End },
            ],
            edges: vec![
                Edge { from: "a".into(), to: "join".into(), condition: None, is_default: false },
                Edge { from: "b".into(), to: "join".into(), condition: None, is_default: false },
            ],
            variables: BTreeMap::new(),
        }
    }

    #[test]
    fn join_node_finds_common_descendant_of_every_branch() {
        let def = def_with_parallel_join();
        let branches = vec!["a".to_string(), "b".to_string()];
        assert_eq!(join_node(&def, &branches), Some("join".to_string()));
    }

    #[test]
    fn join_node_is_none_when_branches_never_reconverge() {
        let mut def = def_with_parallel_join();
        def.edges.retain(|e| e.from != "b");
        def.nodes.push(Node { id: "b_end".into(), kind: NodeKind::End });
        def.edges.push(Edge { from: "b".into(), to: "b_end".into(), condition: None, is_default: false });
        let branches = vec!["a".to_string(), "b".to_string()];
        assert_eq!(join_node(&def, &branches), None);
    }

    #[test]
    fn aggregate_sum_adds_numeric_node_outputs() {
        let mut ctx = WorkflowContext::default();
        ctx.node_outputs.insert("a".into(), serde_json::json!(1));
        ctx.node_outputs.insert("b".into(), serde_json::json!(2));
        let result = aggregate_merge(&["a".to_string(), "b".to_string()], AggregateOp::Sum, &ctx);
        assert_eq!(result, serde_json::json!(3.0));
    }

    #[test]
    fn aggregate_merge_combines_objects() {
        let mut ctx = WorkflowContext::default();
        ctx.node_outputs.insert("a".into(), serde_json::json!({"x": 1}));
        ctx.node_outputs.insert("b".into(), serde_json::json!({"y": 2}));
        let result = aggregate_merge(&["a".to_string(), "b".to_string()], AggregateOp::Merge, &ctx);
        assert_eq!(result, serde_json::json!({"x": 1, "y": 2}));
    }
}
