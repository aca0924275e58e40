// SPDX-License-Identifier: MIT

//! Error taxonomy shared across the runtime (spec §7).
//!
//! Every public fallible operation returns `Result<T, SwarmError>` (or a
//! crate-local error that converts into it via `#[from]`), so a caller
//! several layers removed from where an error originated can still branch
//! on `ErrorKind` without matching every concrete variant.

use thiserror::Error;

/// Coarse-grained category used for branching (retry vs. surface vs. drain).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad config, bad DAG, unknown node type. Never retried.
    Validation,
    /// Store write failure, transport hiccup. Retried with back-off.
    TransientIo,
    /// Agent returned failure, crashed, or went unresponsive.
    Agent,
    /// No response within bound, human task deadline passed.
    Timeout,
    /// Consensus proposal rejected or expired.
    Consensus,
    /// Cannot persist / invariant violated; runtime should drain and exit.
    Fatal,
}

#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("transient io: {0}")]
    TransientIo(String),

    #[error("agent error: {0}")]
    Agent(String),

    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("consensus {0}")]
    Consensus(String),

    #[error("fatal: {0}")]
    Fatal(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("overflow: {0}")]
    Overflow(String),
}

impl SwarmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SwarmError::Validation(_) => ErrorKind::Validation,
            SwarmError::TransientIo(_) => ErrorKind::TransientIo,
            SwarmError::Agent(_) => ErrorKind::Agent,
            SwarmError::Timeout(_) => ErrorKind::Timeout,
            SwarmError::Consensus(_) => ErrorKind::Consensus,
            SwarmError::Fatal(_) => ErrorKind::Fatal,
            SwarmError::NotFound(_) => ErrorKind::Validation,
            SwarmError::Overflow(_) => ErrorKind::TransientIo,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::TransientIo | ErrorKind::Timeout)
    }
}
