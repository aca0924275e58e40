// SPDX-License-Identifier: MIT

//! The Scheduler, a.k.a. the Hive/Queen (spec §4.F): turns submitted
//! objectives into dependency-ordered task batches, scores and assigns
//! agents, detects stalls, recovers from failure, and drives multi-agent
//! consensus. Built on top of `swarm-bus` for transport and
//! `swarm-coordinator` for decomposition/dispatch primitives it reuses
//! rather than duplicates.

pub mod batching;
pub mod consensus;
pub mod failure;
pub mod hive;
pub mod objective;
pub mod queue;
pub mod registry;
pub mod scoring;
pub mod stall;

pub use batching::{batch_duration_ms, topological_batches};
pub use consensus::{ConsensusDriver, DEFAULT_CONSENSUS_THRESHOLD};
pub use failure::{backoff_ms, cascade_failure, should_retry, DEFAULT_RETRY_CAP};
pub use hive::{spawn_control_loop, RetryDecision, Scheduler, SchedulerConfig, SchedulerStats};
pub use objective::{plan_for, DecompositionCache, DomainStrategy, DEFAULT_CACHE_TTL};
pub use queue::TaskQueue;
pub use registry::{AgentRegistry, DEFAULT_SUCCESS_RATE};
pub use scoring::{capability_match, ml_heuristic, score_candidate, ScoreWeights};
pub use stall::{is_stalled, DEFAULT_STALL_THRESHOLD_MS};
