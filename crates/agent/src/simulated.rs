// SPDX-License-Identifier: MIT

//! Reference [`AgentHandle`] for tests and local development: completes
//! every task after a configurable number of progress ticks, matching the
//! teacher's `FakeClock`-substitutes-`SystemClock` pattern for the agent
//! side of the runtime.

use crate::handle::{AgentHandle, AgentOutcome, ProgressReporter};
use async_trait::async_trait;
use swarm_core::{AgentId, AgentProfile, AgentType, Capabilities, SwarmError};

pub struct SimulatedAgent {
    id: AgentId,
    agent_type: AgentType,
    capabilities: Capabilities,
    /// If set, `execute` returns this failure instead of succeeding --
    /// models an agent that always errors, for failure-path tests.
    always_fail: bool,
}

impl SimulatedAgent {
    pub fn new(id: AgentId, agent_type: AgentType) -> Self {
        Self { id, agent_type, capabilities: Capabilities::new(), always_fail: false }
    }

    pub fn with_capability(mut self, name: impl Into<String>, proficiency: f64) -> Self {
        self.capabilities.insert(name.into(), proficiency.clamp(0.0, 1.0));
        self
    }

    pub fn failing(mut self) -> Self {
        self.always_fail = true;
        self
    }
}

#[async_trait]
impl AgentHandle for SimulatedAgent {
    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }

    async fn execute(
        &self,
        body: serde_json::Value,
        report_progress: ProgressReporter,
    ) -> Result<AgentOutcome, SwarmError> {
        if self.always_fail {
            report_progress.report(50);
            return Ok(AgentOutcome::Failure("simulated agent configured to fail".into()));
        }
        report_progress.report(25);
        tokio::task::yield_now().await;
        report_progress.report(75);
        tokio::task::yield_now().await;
        report_progress.report(100);
        Ok(AgentOutcome::Success(serde_json::json!({"echo": body})))
    }

    fn describe(&self) -> AgentProfile {
        let mut profile = AgentProfile::new(self.id.clone(), self.agent_type, 0);
        profile.capabilities = self.capabilities.clone();
        profile
    }
}
