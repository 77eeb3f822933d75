//! The per-tick reconciliation stepper.
//!
//! [`Simulation`] owns the chain arena, the error mirror, the reservoir,
//! the optional meta entity, and the receipt log, and advances them one
//! discrete tick at a time. Each tick runs, in order:
//!
//! 1. **Pressure** -- pin the configured entity's demand, keeping the
//!    scenario live.
//! 2. **Inject** -- snapshot unmet demand into the mirror and the field.
//! 3. **Diffuse** -- exponentially decay every unresolved occurrence.
//! 4. **Birth or drawdown** -- while no meta entity exists, check for
//!    saturation; once it exists, draw a quarter of its energy, drain the
//!    reservoir, and backfeed the drained amount to the current culprit.
//! 5. **Quench check** -- when both the reservoir and the meta entity
//!    collapse below threshold, record the collapse once per run.
//!
//! The stepper is infallible by design: all arithmetic is total (guarded
//! by `max(0, ..)` and clamped draws) and a drawdown that finds no
//! drainable energy is a logged no-op tick, not an error.

use tracing::debug;

use cascade_types::{Params, ParamsPatch, ReceiptKind, SimSnapshot};

use crate::backfeed::backfeed_and_reconcile;
use crate::chain::{ChainArena, ChainHandle};
use crate::config::{CascadeConfig, ScenarioConfig};
use crate::mirror::MirrorArena;
use crate::receipts::ReceiptLog;
use crate::reservoir::Reservoir;

/// Fraction of the meta entity's energy drawn down each tick.
const META_DRAW_FRACTION: f64 = 0.25;

/// Threshold below which reservoir and meta energy count as collapsed.
const QUENCH_EPSILON: f64 = 1e-3;

/// One complete simulation: chain, mirror, reservoir, meta, audit trail.
#[derive(Debug)]
pub struct Simulation {
    /// Ticks executed since construction or the last reset.
    step: u64,
    /// All chain entities, the meta entity included once born.
    chain: ChainArena,
    /// The error mirror, spawned once at construction.
    mirror: MirrorArena,
    /// The shared dissipative reservoir.
    reservoir: Reservoir,
    /// The corrective meta entity, at most one per run.
    meta: Option<ChainHandle>,
    /// Whether the collapse receipt has been emitted this run.
    quenched: bool,
    /// The capped audit trail.
    log: ReceiptLog,
    /// Current tunable parameters.
    params: Params,
    /// Resolved pressure override: (entity, pinned demand).
    pressure: Option<(ChainHandle, f64)>,
    /// Retained for [`Simulation::reset`].
    config: CascadeConfig,
}

impl Simulation {
    /// Build the default demonstration scenario.
    pub fn new() -> Self {
        Self::from_config(CascadeConfig::default())
    }

    /// Build a simulation from configuration.
    ///
    /// Constructs the chain with the configured initial conditions,
    /// spawns the error mirror from the configured failing link (falling
    /// back to the chain head if the id is unknown), and creates an empty
    /// reservoir. No receipts are emitted during construction.
    pub fn from_config(config: CascadeConfig) -> Self {
        let scenario = &config.scenario;
        let (mut chain, head) = ChainArena::build(scenario.entities.iter().map(|e| e.id.clone()));
        for entity_config in &scenario.entities {
            if let Some(entity) = chain.find(&entity_config.id).and_then(|h| chain.get_mut(h)) {
                entity.state = entity_config.state;
                entity.demand = entity_config.demand;
                entity.tolerance = entity_config.tolerance;
            }
        }

        let mirror_start = chain.find(&scenario.mirror_from).or(head);
        let mirror = mirror_start
            .map(|start| MirrorArena::spawn(&chain, start))
            .unwrap_or_default();

        let params = Params::from(config.params);
        let reservoir = Reservoir::new(scenario.reservoir_id.clone(), params.viscosity);
        let pressure = resolve_pressure(&chain, scenario);
        let log = ReceiptLog::new(config.receipts.capacity);

        Self {
            step: 0,
            chain,
            mirror,
            reservoir,
            meta: None,
            quenched: false,
            log,
            params,
            pressure,
            config,
        }
    }

    /// Execute one tick.
    pub fn step(&mut self) {
        self.step = self.step.saturating_add(1);
        let step = self.step;

        // Pressure: keep the scenario live.
        if let Some((handle, demand)) = self.pressure {
            if let Some(entity) = self.chain.get_mut(handle) {
                entity.demand = demand;
            }
        }

        self.reservoir
            .inject(&mut self.mirror, &self.chain, &mut self.log, step);
        self.reservoir
            .diffuse(&mut self.mirror, self.params.dt, &mut self.log, step);

        match self.meta {
            None => {
                self.meta = self.reservoir.check_birth(
                    &mut self.chain,
                    &self.mirror,
                    self.params.limit,
                    &mut self.log,
                    step,
                );
            }
            Some(meta_handle) => {
                self.drawdown(meta_handle, step);
                self.check_quench(meta_handle, step);
            }
        }
    }

    /// Draw down meta energy, drain the reservoir, and backfeed.
    fn drawdown(&mut self, meta_handle: ChainHandle, step: u64) {
        let draw = self.meta_energy() * META_DRAW_FRACTION;
        if draw <= 0.0 {
            return;
        }
        let used = self.reservoir.drain(&mut self.mirror, draw);
        if used <= 0.0 {
            // Stall: energy was requested but the field had nothing to
            // give. Not an error; the tick simply ends here.
            debug!(step, draw, "no drainable energy; no-op tick");
            return;
        }
        if let Some(meta) = self.chain.get_mut(meta_handle) {
            meta.state -= used;
        }
        let _ = backfeed_and_reconcile(&mut self.chain, &mut self.mirror, used, &mut self.log, step);
    }

    /// Record the reservoir/meta collapse, once per run.
    fn check_quench(&mut self, meta_handle: ChainHandle, step: u64) {
        if self.quenched {
            return;
        }
        let total = self.reservoir.total_error(&self.mirror);
        let meta_energy = self.meta_energy();
        if total < QUENCH_EPSILON && meta_energy < QUENCH_EPSILON {
            self.quenched = true;
            let subject = self
                .chain
                .get(meta_handle)
                .map_or_else(String::new, |meta| meta.id.clone());
            self.log.emit(
                step,
                ReceiptKind::Quench,
                &subject,
                "meta and reservoir reconciled; field collapsed",
                total,
                meta_energy,
            );
        }
    }

    /// Replace all state with a fresh construction from the same config.
    ///
    /// The audit trail, the meta entity, and any runtime parameter
    /// changes are discarded.
    pub fn reset(&mut self) {
        *self = Self::from_config(self.config.clone());
    }

    /// Apply a partial parameter update and return the new values.
    ///
    /// Viscosity propagates into the reservoir as well.
    pub fn update_params(&mut self, patch: ParamsPatch) -> Params {
        if let Some(viscosity) = patch.viscosity {
            self.params.viscosity = viscosity;
            self.reservoir.viscosity = viscosity;
        }
        if let Some(limit) = patch.limit {
            self.params.limit = limit;
        }
        if let Some(dt) = patch.dt {
            self.params.dt = dt;
        }
        self.params
    }

    /// Current tunable parameters.
    pub const fn params(&self) -> Params {
        self.params
    }

    /// Current tick number.
    pub const fn step_count(&self) -> u64 {
        self.step
    }

    /// Corrective energy held by the meta entity (0 while none exists).
    pub fn meta_energy(&self) -> f64 {
        self.meta
            .and_then(|handle| self.chain.get(handle))
            .map_or(0.0, |meta| meta.state)
    }

    /// Occurrence-weighted unresolved error energy in the reservoir.
    pub fn total_error(&self) -> f64 {
        self.reservoir.total_error(&self.mirror)
    }

    /// Value copy of the observable state, including the receipt tail.
    pub fn snapshot(&self) -> SimSnapshot {
        SimSnapshot {
            step: self.step,
            total_error: self.total_error(),
            meta_energy: self.meta_energy(),
            receipts: self.log.tail(),
            receipts_dropped: self.log.dropped(),
        }
    }

    /// The chain arena (read-only), for inspection and tests.
    pub const fn chain(&self) -> &ChainArena {
        &self.chain
    }

    /// The error mirror (read-only), for inspection and tests.
    pub const fn mirror(&self) -> &MirrorArena {
        &self.mirror
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the configured pressure override to a chain handle.
fn resolve_pressure(chain: &ChainArena, scenario: &ScenarioConfig) -> Option<(ChainHandle, f64)> {
    scenario
        .pressure
        .as_ref()
        .and_then(|p| chain.find(&p.entity).map(|handle| (handle, p.demand)))
}
