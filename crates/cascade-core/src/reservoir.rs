//! The dissipative reservoir accumulating and smoothing error snapshots.
//!
//! The reservoir's `field` is an ordered, append-only sequence of error
//! entity handles. Injection runs every tick and *appends* rather than
//! updating in place, so the same entity accumulates one occurrence per
//! tick. This inflation is deliberate and load-bearing:
//!
//! - [`Reservoir::total_error`] sums one term per occurrence, so an
//!   unresolved mismatch weighs more the longer it persists.
//! - [`Reservoir::diffuse`] decays per occurrence, so a long-standing
//!   entity also decays faster (decay^n for n occurrences).
//!
//! Saturation is the moment the occurrence-weighted total crosses the
//! configured limit; it spawns the corrective meta entity exactly once
//! per run (the stepper only asks while no meta exists).

use cascade_types::ReceiptKind;
use tracing::{debug, info};

use crate::chain::{ChainArena, ChainEntity, ChainHandle};
use crate::mirror::{ErrorHandle, MirrorArena};
use crate::receipts::ReceiptLog;

/// The meta entity's tolerance, as a fraction of the saturation limit.
const META_TOLERANCE_FRACTION: f64 = 0.1;

/// The shared dissipative buffer between failure and correction.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservoir {
    /// Identifier; the meta entity derives its id from this (`<id>.meta`).
    pub id: String,
    /// Exponential decay rate applied by diffusion (>= 0).
    pub viscosity: f64,
    /// Ordered, append-only occurrences of error entities.
    field: Vec<ErrorHandle>,
}

impl Reservoir {
    /// Create an empty reservoir.
    pub const fn new(id: String, viscosity: f64) -> Self {
        Self {
            id,
            viscosity,
            field: Vec::new(),
        }
    }

    /// Snapshot the chain's unmet demand into the mirror and the field.
    ///
    /// For each error entity from the mirror root to the tail, computes
    /// `err = max(0, |state - demand| - tolerance)` on the origin,
    /// overwrites the entity's snapshot, appends one occurrence to the
    /// field, and emits an `Inject` receipt. Runs every tick
    /// unconditionally; resolved entities still get their snapshot
    /// overwritten, but diffusion and totals skip them.
    pub fn inject(
        &mut self,
        mirror: &mut MirrorArena,
        chain: &ChainArena,
        log: &mut ReceiptLog,
        step: u64,
    ) {
        let handles: Vec<ErrorHandle> = mirror.walk_downstream().collect();
        for handle in handles {
            let Some(entity) = mirror.get_mut(handle) else {
                continue;
            };
            let Some(origin) = chain.get(entity.origin) else {
                continue;
            };
            let err = ((origin.state - origin.demand).abs() - origin.tolerance).max(0.0);
            entity.error_value = err;
            let subject = entity.id.clone();
            self.field.push(handle);
            log.emit(
                step,
                ReceiptKind::Inject,
                &subject,
                "inject into reservoir",
                0.0,
                err,
            );
        }
    }

    /// Exponentially decay every unresolved field occurrence.
    ///
    /// `decay = exp(-viscosity * dt)`. Each occurrence multiplies its
    /// entity's snapshot once and emits a `Diffuse` receipt, so entities
    /// with several occurrences decay correspondingly faster. Resolved
    /// entities keep their last snapshot frozen.
    pub fn diffuse(&self, mirror: &mut MirrorArena, dt: f64, log: &mut ReceiptLog, step: u64) {
        let decay = (-self.viscosity * dt).exp();
        for &handle in &self.field {
            let Some(entity) = mirror.get_mut(handle) else {
                continue;
            };
            if entity.resolved {
                continue;
            }
            let before = entity.error_value;
            entity.error_value *= decay;
            let after = entity.error_value;
            let subject = entity.id.clone();
            log.emit(
                step,
                ReceiptKind::Diffuse,
                &subject,
                "reservoir diffusion",
                before,
                after,
            );
        }
    }

    /// Occurrence-weighted sum of unresolved error energy.
    pub fn total_error(&self, mirror: &MirrorArena) -> f64 {
        self.field
            .iter()
            .filter_map(|&handle| mirror.get(handle))
            .filter(|entity| !entity.resolved)
            .map(|entity| entity.error_value)
            .sum()
    }

    /// Spawn the corrective meta entity if the reservoir has saturated.
    ///
    /// Returns the new entity's handle when `total_error > limit`, else
    /// `None`. The meta entity is born with the full accumulated error as
    /// its state, zero demand, and a tolerance of one tenth of the limit.
    pub fn check_birth(
        &self,
        chain: &mut ChainArena,
        mirror: &MirrorArena,
        limit: f64,
        log: &mut ReceiptLog,
        step: u64,
    ) -> Option<ChainHandle> {
        let total = self.total_error(mirror);
        if total <= limit {
            return None;
        }
        let id = format!("{}.meta", self.id);
        let mut meta = ChainEntity::new(id.clone());
        meta.state = total;
        meta.demand = 0.0;
        meta.tolerance = limit * META_TOLERANCE_FRACTION;
        let handle = chain.insert(meta);
        info!(step, total, limit, meta = %id, "reservoir saturated; meta entity born");
        log.emit(
            step,
            ReceiptKind::MetaBirth,
            &id,
            "reservoir exceeded limit; spawned corrective meta entity",
            total,
            limit,
        );
        Some(handle)
    }

    /// Remove up to `amount` of error energy from the field, in order.
    ///
    /// Walks occurrences front to back, subtracting
    /// `min(error_value, remaining)` from each unresolved positive entry
    /// until `remaining` hits zero or the field is exhausted. Returns the
    /// amount actually drained. Draining never marks entities resolved --
    /// resolution only happens through reconciliation.
    pub fn drain(&self, mirror: &mut MirrorArena, amount: f64) -> f64 {
        let mut remaining = amount;
        for &handle in &self.field {
            if remaining <= 0.0 {
                break;
            }
            let Some(entity) = mirror.get_mut(handle) else {
                continue;
            };
            if entity.resolved || entity.error_value <= 0.0 {
                continue;
            }
            let take = entity.error_value.min(remaining);
            entity.error_value -= take;
            remaining -= take;
        }
        let drained = amount - remaining;
        debug!(requested = amount, drained, "reservoir drain");
        drained
    }

    /// Number of occurrences currently in the field (duplicates counted).
    pub fn occurrence_count(&self) -> usize {
        self.field.len()
    }
}
