// SPDX-License-Identifier: MIT

//! Registered handlers for `Transform`/`Custom` nodes and `Condition::Function`
//! (spec §4.G / §9: node logic beyond the bounded DSL is a named, registered
//! Rust closure -- never a string evaluated as code).

use std::collections::HashMap;
use std::sync::Arc;
use swarm_core::{SwarmError, WorkflowContext};

pub type TransformFn = Arc<dyn Fn(&WorkflowContext) -> Result<serde_json::Value, SwarmError> + Send + Sync>;
pub type PredicateFn = Arc<dyn Fn(&WorkflowContext) -> Result<bool, SwarmError> + Send + Sync>;

#[derive(Default, Clone)]
pub struct HandlerRegistry {
    transforms: HashMap<String, TransformFn>,
    predicates: HashMap<String, PredicateFn>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for `Transform`/`Custom`/`Aggregate`-adjacent
    /// node kinds identified by `handler_id`.
    pub fn register_transform(&mut self, handler_id: impl Into<String>, f: TransformFn) {
        self.transforms.insert(handler_id.into(), f);
    }

    /// Registers a boolean predicate for `Condition::Function`.
    pub fn register_predicate(&mut self, handler_id: impl Into<String>, f: PredicateFn) {
        self.predicates.insert(handler_id.into(), f);
    }

    pub fn call_transform(&self, handler_id: &str, ctx: &WorkflowContext) -> Result<serde_json::Value, SwarmError> {
        let handler = self
            .transforms
            .get(handler_id)
            .ok_or_else(|| SwarmError::Validation(format!("no transform handler registered for {handler_id}")))?;
        handler(ctx)
    }

    pub fn call_predicate(&self, handler_id: &str, ctx: &WorkflowContext) -> Result<bool, SwarmError> {
        let handler = self
            .predicates
            .get(handler_id)
            .ok_or_else(|| SwarmError::Validation(format!("no predicate handler registered for {handler_id}")))?;
        handler(ctx)
    }
}
