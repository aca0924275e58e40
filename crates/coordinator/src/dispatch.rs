// SPDX-License-Identifier: MIT

//! Sends one `task:assignment` `COMMAND` per agent/task pair over the bus
//! (spec §4.E "Task assignment"), and broadcasts formation-change
//! `INFORM`s when a team restructures (spec §4.E "Reformation").

use swarm_bus::MessageBus;
use swarm_core::{AgentId, Clock, Content, Formation, Message, MessageType, Priority, Recipient, SwarmError, Task, TeamId, topics};

use crate::registry::TeamRegistry;

/// Dispatch `task` to `agent` as a `COMMAND` requiring a response; the
/// agent runtime drives it through to a terminal `RESPONSE` (spec §4.D).
pub fn dispatch_assignment<C: Clock>(
    bus: &MessageBus<C>,
    coordinator: AgentId,
    agent: AgentId,
    task: &Task,
    now_epoch_ms: u64,
) -> Result<(), SwarmError> {
    let body = serde_json::json!({
        "task_id": task.id,
        "description": task.description,
        "task_type": task.task_type,
        "constraints": task.constraints,
        "deadline_epoch_ms": task.deadline_epoch_ms,
    });
    let msg = Message::new(
        coordinator,
        Recipient::Single(agent),
        MessageType::Command,
        task.priority,
        now_epoch_ms,
        Content::new(topics::TASK_ASSIGNMENT, body),
    )
    .requiring_response();
    bus.send(msg)
}

/// Broadcast the team's new structure on `INFORM` after a formation change
/// (spec §4.E "Reformation": `INFORM structure:*`).
pub fn broadcast_structure_change<C: Clock>(
    bus: &MessageBus<C>,
    coordinator: AgentId,
    formation: Formation,
    now_epoch_ms: u64,
) -> Result<(), SwarmError> {
    let msg = Message::new(
        coordinator,
        Recipient::Broadcast,
        MessageType::Inform,
        Priority::Normal,
        now_epoch_ms,
        Content::new(formation.structure_topic(), serde_json::json!({"formation": formation})),
    );
    bus.send(msg)
}

/// `disbandTeam` (spec §4.E): removes `team_id`'s record from `registry`
/// and notifies every former member with an `INFORM` on `team:disbanded`
/// before the bus loses track of who they were. A best-effort send failure
/// for one former member does not stop the others from being notified, and
/// does not undo the disband -- the record is already gone by the time we
/// try to notify.
pub fn disband_team_and_notify<C: Clock>(
    bus: &MessageBus<C>,
    registry: &TeamRegistry,
    coordinator: AgentId,
    team_id: &TeamId,
    reason: &str,
    now_epoch_ms: u64,
) -> Result<Vec<AgentId>, SwarmError> {
    let former_members = registry.disband_team(team_id)?;
    for member in &former_members {
        if *member == coordinator {
            continue;
        }
        let msg = Message::new(
            coordinator.clone(),
            Recipient::Single(member.clone()),
            MessageType::Inform,
            Priority::Normal,
            now_epoch_ms,
            Content::new(topics::TEAM_DISBANDED, serde_json::json!({"team_id": team_id, "reason": reason})),
        );
        let _ = bus.send(msg);
    }
    Ok(former_members)
}
