// SPDX-License-Identifier: MIT

//! Centralized environment variable access for the runtime owner (spec §6
//! "Configuration"), mirroring the teacher's single `env.rs` module. No CLI
//! flag parsing or YAML loading lives here or anywhere in the core (§1
//! non-goal) -- [`RuntimeConfig::default()`] covers programmatic embedding.

use std::path::PathBuf;

/// Every `RUNTIME_*` tunable named in spec §6, with the typed defaults each
/// component already uses on its own when unconfigured.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub state_dir: Option<PathBuf>,
    pub snapshot_interval_ms: u64,
    pub event_buffer_size: usize,
    pub event_flush_ms: u64,
    pub max_agents: Option<usize>,
    pub stall_threshold_ms: u64,
    pub heartbeat_ms: u64,
    pub consensus_threshold: f64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            snapshot_interval_ms: 5 * 60 * 1_000,
            event_buffer_size: swarm_store::DEFAULT_CAPACITY,
            event_flush_ms: 30 * 1_000,
            max_agents: None,
            stall_threshold_ms: swarm_scheduler::DEFAULT_STALL_THRESHOLD_MS,
            heartbeat_ms: swarm_agent::RuntimeConfig::default().heartbeat_interval_ms,
            consensus_threshold: swarm_scheduler::DEFAULT_CONSENSUS_THRESHOLD,
        }
    }
}

impl RuntimeConfig {
    /// Reads every `RUNTIME_*` variable named in spec §6, falling back to
    /// [`Self::default`] for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            state_dir: std::env::var("RUNTIME_STATE_DIR").ok().map(PathBuf::from),
            snapshot_interval_ms: env_u64("RUNTIME_SNAPSHOT_INTERVAL_MS", defaults.snapshot_interval_ms),
            event_buffer_size: env_usize("RUNTIME_EVENT_BUFFER_SIZE", defaults.event_buffer_size),
            event_flush_ms: env_u64("RUNTIME_EVENT_FLUSH_MS", defaults.event_flush_ms),
            max_agents: std::env::var("RUNTIME_MAX_AGENTS").ok().and_then(|s| s.parse().ok()),
            stall_threshold_ms: env_u64("RUNTIME_STALL_THRESHOLD_MS", defaults.stall_threshold_ms),
            heartbeat_ms: env_u64("RUNTIME_HEARTBEAT_MS", defaults.heartbeat_ms),
            consensus_threshold: env_f64("RUNTIME_CONSENSUS_THRESHOLD", defaults.consensus_threshold),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_each_component_own_default() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.stall_threshold_ms, swarm_scheduler::DEFAULT_STALL_THRESHOLD_MS);
        assert_eq!(cfg.consensus_threshold, swarm_scheduler::DEFAULT_CONSENSUS_THRESHOLD);
    }

    #[test]
    fn unset_variable_falls_back_to_default() {
        std::env::remove_var("RUNTIME_STALL_THRESHOLD_MS");
        let cfg = RuntimeConfig::from_env();
        assert_eq!(cfg.stall_threshold_ms, swarm_scheduler::DEFAULT_STALL_THRESHOLD_MS);
    }
}
