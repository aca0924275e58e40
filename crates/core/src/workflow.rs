// SPDX-License-Identifier: MIT

//! Workflow DAG data model (spec §3 "WorkflowDefinition" / "WorkflowInstance"
//! / "Snapshot", §4.G node semantics). The interpreter itself lives in
//! `swarm-workflow`; this crate only carries the shape.

use crate::define_id;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

define_id! {
    pub struct WorkflowDefId("wfdef_");
}
define_id! {
    pub struct WorkflowInstanceId("wfi_");
}
define_id! {
    pub struct SnapshotId("snap_");
}
define_id! {
    pub struct HumanTaskId("htask_");
}

/// One of the closed set of node kinds (spec §4.G table). Node-specific
/// configuration rides in the matching variant rather than a dynamic
/// "options" map (spec §9 redesign note).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Start,
    End,
    Task {
        /// Topic dispatched over the message bus.
        topic: String,
    },
    Decision,
    Parallel {
        branches: Vec<String>,
    },
    Loop {
        condition: Condition,
        #[serde(default = "default_max_iterations")]
        max_iterations: u32,
    },
    HumanTask {
        prompt: String,
        #[serde(default)]
        deadline_epoch_ms: Option<u64>,
    },
    Timer {
        delay_ms: u64,
    },
    Event {
        event_type: String,
    },
    Subworkflow {
        def_id: WorkflowDefId,
    },
    Transform {
        /// Registered handler id (spec §9: never eval arbitrary source).
        handler_id: String,
    },
    Aggregate {
        inputs: Vec<String>,
        merge: AggregateOp,
    },
    Custom {
        handler_id: String,
    },
}

fn default_max_iterations() -> u32 {
    100
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateOp {
    Merge,
    Concat,
    Sum,
    Average,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
}

/// `left op right` comparison operators (spec §4.G "Conditions").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
}

/// Three side-effect-free condition forms (spec §4.G / §9 redesign note:
/// a bounded DSL or a registered handler, never `eval`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum Condition {
    Expression { expr: String },
    Comparison { left: String, op: ComparisonOp, right: String },
    Function { handler_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    /// Marks the last-resort edge evaluated in a decision node (spec §4.G:
    /// "`DEFAULT` edge is last-resort").
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: WorkflowDefId,
    pub version: u32,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub variables: BTreeMap<String, serde_json::Value>,
}

impl WorkflowDefinition {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn outgoing(&self, id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.from == id).collect()
    }

    pub fn start_nodes(&self) -> Vec<&Node> {
        self.nodes.iter().filter(|n| matches!(n.kind, NodeKind::Start)).collect()
    }

    pub fn end_nodes(&self) -> Vec<&Node> {
        self.nodes.iter().filter(|n| matches!(n.kind, NodeKind::End)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    Running,
    Paused,
    Waiting,
    Completed,
    Failed,
    Cancelled,
}

/// Evolving variable/output map threaded through node execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowContext {
    pub inputs: BTreeMap<String, serde_json::Value>,
    pub variables: BTreeMap<String, serde_json::Value>,
    pub outputs: BTreeMap<String, serde_json::Value>,
    /// Per-node output, ordered by first write (IndexMap preserves
    /// insertion order, matching replay order).
    pub node_outputs: IndexMap<String, serde_json::Value>,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: WorkflowInstanceId,
    pub def_id: WorkflowDefId,
    pub status: InstanceStatus,
    pub current_node: String,
    pub context: WorkflowContext,
    pub human_tasks: Vec<HumanTaskId>,
    pub started_at_epoch_ms: u64,
    pub completed_at_epoch_ms: Option<u64>,
    pub parent: Option<WorkflowInstanceId>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumanTaskStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanTask {
    pub id: HumanTaskId,
    pub instance_id: WorkflowInstanceId,
    pub node_id: String,
    pub prompt: String,
    pub status: HumanTaskStatus,
    /// Absent means "no deadline" (spec §9 Open Question).
    pub deadline_epoch_ms: Option<u64>,
    pub response: Option<serde_json::Value>,
    pub created_at_epoch_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub instance_id: WorkflowInstanceId,
    pub timestamp_epoch_ms: u64,
    pub state_blob: serde_json::Value,
    pub checksum: String,
    pub metadata: Option<BTreeMap<String, String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_def() -> WorkflowDefinition {
        WorkflowDefinition {
            id: WorkflowDefId::new(),
            version: 1,
            nodes: vec![
                Node { id: "start".into(), kind: NodeKind::Start },
                Node { id: "t".into(), kind: NodeKind::Task { topic: "do:thing".into() } },
                Node { id: "end".into(), kind: NodeKind::End },
            ],
            edges: vec![
                Edge { from: "start".into(), to: "t".into(), condition: None, is_default: false },
                Edge { from: "t".into(), to: "end".into(), condition: None, is_default: false },
            ],
            variables: BTreeMap::new(),
        }
    }

    #[test]
    fn finds_start_and_end_nodes() {
        let def = sample_def();
        assert_eq!(def.start_nodes().len(), 1);
        assert_eq!(def.end_nodes().len(), 1);
    }

    #[test]
    fn outgoing_filters_by_source() {
        let def = sample_def();
        assert_eq!(def.outgoing("start").len(), 1);
        assert_eq!(def.outgoing("end").len(), 0);
    }
}
