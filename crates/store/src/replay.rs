// SPDX-License-Identifier: MIT

//! Event application for `StateStore::recover_instance` (spec §4.B
//! "Replay"). The store only knows the small, closed set of event kinds the
//! runtime actually records (`node.entered`, `workflow.cancelled`, ...); it
//! folds them onto a `WorkflowInstance` the same way `MaterializedState`
//! folds `StoreOp`s onto itself.

use swarm_core::{Event, InstanceStatus, WorkflowInstance};

/// Mutate `instance` to reflect one recorded event. Unknown kinds are
/// ignored: the event log also carries purely diagnostic entries that have
/// no state to replay. Exposed beyond this crate so `swarm-workflow`'s own
/// `resume_workflow` can fold post-snapshot events with the same rules
/// `recover_instance` uses.
pub fn apply_event_to_instance(instance: &mut WorkflowInstance, event: &Event) {
    match event.kind.as_str() {
        "node.entered" => {
            if let Some(node_id) = event.node_id.as_deref().or_else(|| event.payload.get("node_id").and_then(|v| v.as_str())) {
                instance.current_node = node_id.to_string();
            }
        }
        "workflow.cancelled" => {
            instance.status = InstanceStatus::Cancelled;
            instance.completed_at_epoch_ms.get_or_insert(event.timestamp_epoch_ms);
            if let Some(reason) = event.payload.get("reason").and_then(|v| v.as_str()) {
                instance.error = Some(reason.to_string());
            }
        }
        "workflow.completed" => {
            instance.status = InstanceStatus::Completed;
            instance.completed_at_epoch_ms.get_or_insert(event.timestamp_epoch_ms);
        }
        "workflow.failed" => {
            instance.status = InstanceStatus::Failed;
            instance.completed_at_epoch_ms.get_or_insert(event.timestamp_epoch_ms);
            if let Some(reason) = event.payload.get("reason").and_then(|v| v.as_str()) {
                instance.error = Some(reason.to_string());
            }
        }
        _ => {}
    }
}
