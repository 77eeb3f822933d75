//! Engine binary for the Cascade reconciliation simulation.
//!
//! Wires the core together and runs it: loads configuration, builds the
//! simulation controller, starts the dual-rate streaming loop, and logs
//! each published frame until interrupted.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `cascade-config.yaml` (or defaults)
//! 3. Build the simulation and wrap it in the controller
//! 4. Start the background stepping/publishing loop
//! 5. Log frames until ctrl-c, then tear the loop down cleanly

mod error;

use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::EnvFilter;

use cascade_core::{CascadeConfig, SimController, Simulation};

use crate::error::EngineError;

/// Environment variable overriding the configuration file path.
const CONFIG_ENV: &str = "CASCADE_CONFIG";

/// Default configuration file path, relative to the working directory.
const CONFIG_PATH: &str = "cascade-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration loading or signal handling fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("cascade-engine starting");

    let path = std::env::var(CONFIG_ENV)
        .map_or_else(|_| PathBuf::from(CONFIG_PATH), PathBuf::from);
    let config = CascadeConfig::load_or_default(&path)?;
    info!(
        entities = config.scenario.entities.len(),
        mirror_from = %config.scenario.mirror_from,
        viscosity = config.params.viscosity,
        limit = config.params.limit,
        dt = config.params.dt,
        "configuration loaded"
    );

    let controller = SimController::new(Simulation::from_config(config.clone()));
    let (stream, mut frames) = controller.spawn_stream(config.stream);

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("shutdown signal received");
                break;
            }
            frame = frames.recv() => {
                let Some(frame) = frame else {
                    break;
                };
                info!(
                    step = frame.step,
                    total_error = frame.total_error,
                    meta_energy = frame.meta_energy,
                    receipts = frame.receipts.len(),
                    "frame"
                );
                if tracing::enabled!(tracing::Level::DEBUG) {
                    if let Ok(json) = serde_json::to_string(&frame) {
                        tracing::debug!(frame = %json, "frame detail");
                    }
                }
            }
        }
    }

    stream.stop().await;
    info!("cascade-engine stopped");
    Ok(())
}
