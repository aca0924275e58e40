// SPDX-License-Identifier: MIT

//! DAG state-machine interpreter for workflow definitions (spec §4.G): a
//! `WorkflowEngine` walks a `WorkflowDefinition`'s nodes one at a time,
//! checkpointing after every transition, suspending at `HumanTask`/`Event`
//! nodes and resuming from a stored snapshot plus replayed events.

pub mod engine;
pub mod expr;
pub mod handlers;
pub mod interpreter;
pub mod validate;

pub use engine::{EngineConfig, RunOutcome, WorkflowEngine};
pub use expr::{evaluate_condition, evaluate_expression};
pub use handlers::{HandlerRegistry, PredicateFn, TransformFn};
pub use interpreter::{aggregate_merge, loop_body_edge, loop_exit_edge, select_next_edge};
pub use validate::validate_definition;
