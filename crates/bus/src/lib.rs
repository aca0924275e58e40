// SPDX-License-Identifier: MIT

//! swarm-bus: typed, priority-aware message delivery between agents, with
//! per-recipient mailboxes, request/response correlation, and coordination
//! metrics (spec §4.C).

pub mod bus;
pub mod mailbox;
pub mod metrics;
pub mod transport;

pub use bus::{BusConfig, MessageBus};
pub use mailbox::{Mailbox, HARD_LIMIT, SOFT_LIMIT};
pub use metrics::{BusMetrics, Ewma};
pub use transport::{InProcessTransport, Transport};
