// SPDX-License-Identifier: MIT

//! Maps a top-level [`SwarmError`] to the process exit codes in spec §6,
//! the way the teacher's `LifecycleError` maps to process exit codes.

use swarm_core::{ErrorKind, SwarmError};

pub const EXIT_OK: i32 = 0;
pub const EXIT_CONFIG_INVALID: i32 = 64;
pub const EXIT_STORE_UNREACHABLE: i32 = 70;
pub const EXIT_STUCK_SHUTDOWN: i32 = 75;

pub fn startup_exit_code(err: &SwarmError) -> i32 {
    match err.kind() {
        ErrorKind::Validation => EXIT_CONFIG_INVALID,
        ErrorKind::TransientIo | ErrorKind::Fatal => EXIT_STORE_UNREACHABLE,
        ErrorKind::Timeout => EXIT_STUCK_SHUTDOWN,
        ErrorKind::Agent | ErrorKind::Consensus => EXIT_STORE_UNREACHABLE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_maps_to_config_invalid() {
        assert_eq!(startup_exit_code(&SwarmError::Validation("bad dir".into())), EXIT_CONFIG_INVALID);
    }

    #[test]
    fn transient_io_maps_to_store_unreachable() {
        assert_eq!(startup_exit_code(&SwarmError::TransientIo("disk".into())), EXIT_STORE_UNREACHABLE);
    }
}
