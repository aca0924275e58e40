// SPDX-License-Identifier: MIT

//! Process entrypoint: installs logging, builds the [`swarmd::Runtime`],
//! runs its control loop until an interrupt or shutdown signal, then drains
//! and exits with the code spec §6 maps from the failure category.

use swarmd::config::RuntimeConfig;
use swarmd::exit_code::{startup_exit_code, EXIT_OK};
use swarmd::Runtime;

#[tokio::main]
async fn main() {
    install_tracing();

    let config = RuntimeConfig::from_env();
    let runtime = match Runtime::start(config) {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(error = %err, "failed to start runtime");
            std::process::exit(startup_exit_code(&err));
        }
    };

    let control_loop = runtime.spawn_control_loop();
    tracing::info!("swarmd runtime started");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received interrupt, shutting down");
        }
        _ = runtime.shutdown_signal().cancelled() => {}
    }

    if let Err(err) = runtime.shutdown() {
        tracing::error!(error = %err, "error during shutdown");
        std::process::exit(startup_exit_code(&err));
    }
    control_loop.abort();

    std::process::exit(EXIT_OK);
}

fn install_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();
}
