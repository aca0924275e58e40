// SPDX-License-Identifier: MIT

//! The narrow interface a concrete agent process implements (spec §4.D,
//! §9 "async/await ... expressed as the suspension contract"). The runtime
//! drives `handle` from its mailbox consumer loop; everything reserved-topic
//! dispatch and lifecycle bookkeeping lives in [`crate::runtime::AgentRuntime`].

use async_trait::async_trait;
use swarm_core::{AgentProfile, SwarmError};

/// Result of executing a `task:assignment` command: either outputs to carry
/// back in the terminal `RESPONSE`, or a failure reason (spec §4.D
/// "terminates with a RESPONSE (success/failure + outputs)").
#[derive(Debug, Clone)]
pub enum AgentOutcome {
    Success(serde_json::Value),
    Failure(String),
}

/// What a concrete agent does with a `task:assignment` payload. Agents are
/// opaque compute (LLM callers, tool runners, analysts); this trait is the
/// only seam the core reaches through.
#[async_trait]
pub trait AgentHandle: Send + Sync {
    /// Current capability set, reported on `capability:query`.
    fn capabilities(&self) -> swarm_core::Capabilities;

    /// Execute one `task:assignment` payload (`{tasks, goal, strategy}`).
    /// `report_progress` lets the implementation emit 0-100 progress INFORMs
    /// as it works; the runtime sends them immediately rather than batching.
    async fn execute(
        &self,
        body: serde_json::Value,
        report_progress: ProgressReporter,
    ) -> Result<AgentOutcome, SwarmError>;

    /// Rolling performance counters reported on `performance:metrics`.
    /// Default: an empty object; implementations with real counters should
    /// override this.
    fn performance_metrics(&self) -> serde_json::Value {
        serde_json::json!({})
    }

    /// Static profile metadata (id/type are filled in by the runtime from
    /// its own construction args; only capabilities/agent_type matter here).
    fn describe(&self) -> AgentProfile;
}

/// Callback an [`AgentHandle::execute`] implementation uses to emit
/// progress without needing a reference back to the runtime or bus.
#[derive(Clone)]
pub struct ProgressReporter {
    sender: tokio::sync::mpsc::UnboundedSender<u8>,
}

impl ProgressReporter {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<u8>) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn report(&self, progress: u8) {
        let _ = self.sender.send(progress.min(100));
    }
}
