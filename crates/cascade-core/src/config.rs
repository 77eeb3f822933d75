//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `cascade-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror
//! the YAML structure and provides a loader that reads the file. Every
//! field has a default matching the built-in demonstration scenario, so
//! a missing file (or any subset of keys) still yields a runnable setup.

use std::path::Path;

use serde::Deserialize;

use cascade_types::Params;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration for one simulation run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CascadeConfig {
    /// The chain scenario: entities, mirror start, pressure override.
    #[serde(default)]
    pub scenario: ScenarioConfig,

    /// Initial tunable parameters.
    #[serde(default)]
    pub params: ParamsConfig,

    /// Dual-rate streaming settings.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Audit-trail retention settings.
    #[serde(default)]
    pub receipts: ReceiptConfig,
}

impl CascadeConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yml::from_str(&contents)?)
    }

    /// Load configuration, falling back to defaults if the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(path = %path.display(), "no config file; using defaults");
            Ok(Self::default())
        }
    }
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// Initial conditions for one chain entity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntityConfig {
    /// Entity identifier, unique within the chain.
    pub id: String,
    /// Initial state.
    #[serde(default)]
    pub state: f64,
    /// Initial demand.
    #[serde(default)]
    pub demand: f64,
    /// Tolerance band (>= 0).
    #[serde(default)]
    pub tolerance: f64,
}

/// A fixed demand override applied to one entity at the start of every
/// tick, keeping the scenario under live pressure.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PressureConfig {
    /// The entity whose demand is pinned.
    pub entity: String,
    /// The pinned demand value.
    pub demand: f64,
}

/// The chain scenario: entity list, mirror start, and pressure override.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScenarioConfig {
    /// Chain entities in parent -> child order.
    #[serde(default = "default_entities")]
    pub entities: Vec<EntityConfig>,

    /// Id of the failing link the error mirror spawns from. Falls back
    /// to the chain head if the id is unknown.
    #[serde(default = "default_mirror_from")]
    pub mirror_from: String,

    /// Optional per-tick demand override.
    #[serde(default = "default_pressure")]
    pub pressure: Option<PressureConfig>,

    /// Reservoir identifier; the meta entity derives its id from this.
    #[serde(default = "default_reservoir_id")]
    pub reservoir_id: String,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            entities: default_entities(),
            mirror_from: default_mirror_from(),
            pressure: default_pressure(),
            reservoir_id: default_reservoir_id(),
        }
    }
}

/// The built-in A -> B -> C -> D demonstration chain.
fn default_entities() -> Vec<EntityConfig> {
    let values = [
        ("A", 0.0, 0.0, 0.01),
        ("B", 1.2, 1.6, 0.05),
        ("C", 1.5, 1.5, 0.05),
        ("D", 1.5, 1.5, 0.05),
    ];
    values
        .into_iter()
        .map(|(id, state, demand, tolerance)| EntityConfig {
            id: String::from(id),
            state,
            demand,
            tolerance,
        })
        .collect()
}

fn default_mirror_from() -> String {
    String::from("B")
}

fn default_pressure() -> Option<PressureConfig> {
    Some(PressureConfig {
        entity: String::from("B"),
        demand: 1.6,
    })
}

fn default_reservoir_id() -> String {
    String::from("chi")
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Initial values for the tunable parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ParamsConfig {
    /// Reservoir decay rate.
    #[serde(default = "default_viscosity")]
    pub viscosity: f64,
    /// Saturation limit for meta birth.
    #[serde(default = "default_limit")]
    pub limit: f64,
    /// Simulated time per tick.
    #[serde(default = "default_dt")]
    pub dt: f64,
}

impl Default for ParamsConfig {
    fn default() -> Self {
        Self {
            viscosity: default_viscosity(),
            limit: default_limit(),
            dt: default_dt(),
        }
    }
}

impl From<ParamsConfig> for Params {
    fn from(config: ParamsConfig) -> Self {
        Self {
            viscosity: config.viscosity,
            limit: config.limit,
            dt: config.dt,
        }
    }
}

const fn default_viscosity() -> f64 {
    0.05
}

const fn default_limit() -> f64 {
    0.5
}

const fn default_dt() -> f64 {
    1.0
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

/// Timer periods and change threshold for the dual-rate publisher.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct StreamConfig {
    /// Step timer period in milliseconds (~30 Hz by default).
    #[serde(default = "default_step_interval_ms")]
    pub step_interval_ms: u64,
    /// Publish timer period in milliseconds (5 Hz by default).
    #[serde(default = "default_publish_interval_ms")]
    pub publish_interval_ms: u64,
    /// Minimum change in total error or meta energy worth publishing.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            step_interval_ms: default_step_interval_ms(),
            publish_interval_ms: default_publish_interval_ms(),
            epsilon: default_epsilon(),
        }
    }
}

const fn default_step_interval_ms() -> u64 {
    33
}

const fn default_publish_interval_ms() -> u64 {
    200
}

const fn default_epsilon() -> f64 {
    1e-5
}

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

/// Audit-trail retention settings.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ReceiptConfig {
    /// Maximum number of receipts retained before eviction begins.
    #[serde(default = "default_receipt_capacity")]
    pub capacity: usize,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            capacity: default_receipt_capacity(),
        }
    }
}

const fn default_receipt_capacity() -> usize {
    crate::receipts::DEFAULT_CAPACITY
}
