// SPDX-License-Identifier: MIT

//! The scheduler's view of live agents (spec §4.F "Agent scoring" needs a
//! historical success rate per agent; §3 "Scheduler owns strategy
//! registries and an in-memory task queue, both reconstructible from the
//! store"). Profiles arrive via `state:query`/`capability:query` responses
//! the embedding runtime forwards in; this registry never calls the bus
//! itself.

use std::collections::HashMap;

use parking_lot::RwLock;
use swarm_bus::Ewma;
use swarm_core::{AgentId, AgentLifecycle, AgentProfile};

/// Default historical success rate for an agent the scheduler has never
/// observed completing or failing a task (spec §4.F "Agent scoring").
pub const DEFAULT_SUCCESS_RATE: f64 = 0.8;

struct Entry {
    profile: AgentProfile,
    success: Ewma,
    observed: bool,
}

/// In-memory, reconstructible agent directory. Reconstruction happens by
/// replaying the last known `AgentProfile` for every agent that shows up in
/// the store's task/assignment history; this type itself holds no durable
/// state.
#[derive(Default)]
pub struct AgentRegistry {
    inner: RwLock<HashMap<String, Entry>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh an agent's profile (capabilities, lifecycle,
    /// workload). Success-rate history is preserved across refreshes.
    pub fn upsert_profile(&self, profile: AgentProfile) {
        let key = profile.id.address();
        let mut inner = self.inner.write();
        match inner.get_mut(&key) {
            Some(entry) => entry.profile = profile,
            None => {
                inner.insert(key, Entry { profile, success: Ewma::new(0.3), observed: false });
            }
        }
    }

    pub fn get(&self, id: &AgentId) -> Option<AgentProfile> {
        self.inner.read().get(&id.address()).map(|e| e.profile.clone())
    }

    pub fn all(&self) -> Vec<AgentProfile> {
        self.inner.read().values().map(|e| e.profile.clone()).collect()
    }

    pub fn available(&self) -> Vec<AgentProfile> {
        self.inner.read().values().filter(|e| e.profile.is_available()).map(|e| e.profile.clone()).collect()
    }

    /// Historical success rate, bounded `[0,1]`; `DEFAULT_SUCCESS_RATE` for
    /// an agent with no recorded outcomes yet.
    pub fn success_rate(&self, id: &AgentId) -> f64 {
        match self.inner.read().get(&id.address()) {
            Some(entry) if entry.observed => entry.success.value(),
            _ => DEFAULT_SUCCESS_RATE,
        }
    }

    /// Record a task completion (`true`) or failure (`false`) against the
    /// agent's EWMA and, on success, its `tasks_completed` counter (used by
    /// the coordinator's own tie-break, spec §4.E).
    pub fn record_outcome(&self, id: &AgentId, success: bool) {
        let mut inner = self.inner.write();
        if let Some(entry) = inner.get_mut(&id.address()) {
            entry.success.observe(if success { 1.0 } else { 0.0 });
            entry.observed = true;
            if success {
                entry.profile.tasks_completed += 1;
            }
        }
    }

    /// Mark an agent offline after an agent-level failure (spec §4.F
    /// "Failure handling": "mark the agent offline").
    pub fn mark_offline(&self, id: &AgentId) {
        if let Some(entry) = self.inner.write().get_mut(&id.address()) {
            entry.profile.lifecycle = AgentLifecycle::Offline;
        }
    }

    pub fn mark_unresponsive(&self, id: &AgentId) {
        if let Some(entry) = self.inner.write().get_mut(&id.address()) {
            entry.profile.lifecycle = AgentLifecycle::Unresponsive;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::AgentType;

    fn profile(id: &str) -> AgentProfile {
        AgentProfile::new(AgentId::new("ns", id), AgentType::Coder, 0)
    }

    #[test]
    fn unknown_agent_defaults_to_point_eight() {
        let reg = AgentRegistry::new();
        assert_eq!(reg.success_rate(&AgentId::new("ns", "ghost")), DEFAULT_SUCCESS_RATE);
    }

    #[test]
    fn recorded_outcomes_move_the_ewma_away_from_default() {
        let reg = AgentRegistry::new();
        let id = AgentId::new("ns", "a1");
        reg.upsert_profile(profile("a1"));
        reg.record_outcome(&id, false);
        assert!(reg.success_rate(&id) < DEFAULT_SUCCESS_RATE);
    }

    #[test]
    fn successful_outcome_increments_tasks_completed() {
        let reg = AgentRegistry::new();
        let id = AgentId::new("ns", "a1");
        reg.upsert_profile(profile("a1"));
        reg.record_outcome(&id, true);
        assert_eq!(reg.get(&id).unwrap().tasks_completed, 1);
    }

    #[test]
    fn offline_agent_is_excluded_from_available() {
        let reg = AgentRegistry::new();
        let id = AgentId::new("ns", "a1");
        reg.upsert_profile(profile("a1"));
        reg.mark_offline(&id);
        assert!(reg.available().is_empty());
    }
}
