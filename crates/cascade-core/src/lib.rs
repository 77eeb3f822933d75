//! Cascading-pressure reconciliation engine.
//!
//! A linear chain of stateful entities sits under demand pressure. A
//! mirrored error chain snapshots each entity's unmet demand every tick,
//! a shared dissipative reservoir accumulates and smooths those snapshots,
//! and -- once the reservoir saturates -- a spontaneously-created corrective
//! entity drains it and feeds corrections back to the chain's current
//! culprit until the mismatch is reconciled.
//!
//! # Modules
//!
//! - [`chain`] -- Arena-backed chain of stateful entities.
//! - [`mirror`] -- The doubly-linked error mirror spawned from a failing link.
//! - [`reservoir`] -- Injection, exponential diffusion, saturation detection,
//!   and drain operations over the shared error field.
//! - [`backfeed`] -- Culprit selection, correction distribution, and
//!   reconciliation.
//! - [`receipts`] -- The capped append-only audit trail.
//! - [`sim`] -- The per-tick stepper gluing the pieces together.
//! - [`config`] -- YAML configuration loading for scenario and runtime knobs.
//! - [`controller`] -- Lock-serialized async access and dual-rate streaming.

pub mod backfeed;
pub mod chain;
pub mod config;
pub mod controller;
pub mod mirror;
pub mod receipts;
pub mod reservoir;
pub mod sim;

pub use chain::{ChainArena, ChainEntity, ChainHandle};
pub use config::{CascadeConfig, ConfigError, ScenarioConfig, StreamConfig};
pub use controller::{SimController, StreamHandle};
pub use mirror::{ErrorEntity, ErrorHandle, MirrorArena};
pub use receipts::ReceiptLog;
pub use reservoir::Reservoir;
pub use sim::Simulation;
