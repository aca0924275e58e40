// SPDX-License-Identifier: MIT

//! swarm-core: identity, message envelope, and domain types shared by every
//! other crate in the orchestration runtime.

pub mod agent;
pub mod clock;
pub mod consensus;
pub mod error;
pub mod event;
pub mod id;
pub mod message;
pub mod task;
pub mod team;
pub mod time;
pub mod workflow;

pub use agent::{AgentId, AgentLifecycle, AgentProfile, AgentType, Capabilities};
pub use clock::{Clock, FakeClock, SystemClock};
pub use consensus::{ConsensusProposal, ConsensusStatus, ProposalId, Vote, VoteChoice};
pub use error::{ErrorKind, SwarmError};
pub use event::{Event, EventId};
pub use message::{topics, Content, Message, MessageId, MessageType, Priority, Recipient};
pub use task::{Task, TaskId, TaskStatus, TaskType};
pub use team::{Formation, Team, TeamId, TeamStatus};
pub use workflow::{
    AggregateOp, ComparisonOp, Condition, Edge, HumanTask, HumanTaskId, HumanTaskStatus,
    InstanceStatus, Node, NodeKind, Snapshot, SnapshotId, WorkflowContext, WorkflowDefId,
    WorkflowDefinition, WorkflowInstance, WorkflowInstanceId,
};
