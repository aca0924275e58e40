// SPDX-License-Identifier: MIT

//! Team lifecycle, formation strategies, goal decomposition, capability
//! matching, and reformation (spec §4.E "Team Coordinator").
//!
//! This crate owns team *logic*; `swarm_core::Team` only carries the shape
//! and the invariant it must uphold.

pub mod assign;
pub mod decompose;
pub mod dispatch;
pub mod registry;
pub mod reformation;
pub mod strategy;

pub use assign::{best_agent_for_task, score_agent_for_task};
pub use decompose::{complexity_score, decompose, materialize, required_capabilities, TaskSpec};
pub use dispatch::{broadcast_structure_change, disband_team_and_notify, dispatch_assignment};
pub use registry::TeamRegistry;
pub use reformation::{evaluate_reformation, MIN_REFORMATION_GAIN};
pub use strategy::{select_strategy, Strategy, StrategyContext};
