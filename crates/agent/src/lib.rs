// SPDX-License-Identifier: MIT

//! swarm-agent: the per-agent mailbox consumer loop, reserved-topic
//! responders, and heartbeat monitoring described in spec §4.D.
//!
//! The core never calls an LLM or tool itself (spec §1 non-goal); concrete
//! agent behavior lives behind the narrow [`AgentHandle`] trait that an
//! embedding process implements. [`SimulatedAgent`] is a reference
//! implementation used by tests and local development, matching the
//! teacher's `FakeClock`-for-`SystemClock` substitution pattern.

pub mod handle;
pub mod heartbeat;
pub mod runtime;
pub mod simulated;

pub use handle::{AgentHandle, AgentOutcome};
pub use heartbeat::HeartbeatMonitor;
pub use runtime::{AgentRuntime, RuntimeConfig};
pub use simulated::SimulatedAgent;
