//! Culprit selection, correction distribution, and reconciliation.
//!
//! When the meta entity releases corrective energy, it has to land
//! somewhere. The culprit is the first mirror entity (root toward tail)
//! whose origin still violates its tolerance band; if the whole chain is
//! within tolerance the most downstream entity takes the correction, so
//! a correction always lands even on a length-one mirror.

use cascade_types::ReceiptKind;
use tracing::debug;

use crate::chain::{ChainArena, ChainEntity};
use crate::mirror::{ErrorHandle, MirrorArena};
use crate::receipts::ReceiptLog;

/// Apply a drawn correction to the chain's current culprit.
///
/// Selection walks the mirror from the root via `downstream` links and
/// picks the first entity whose origin violates tolerance, marking it
/// `is_culprit`; with no violator, the tail is picked as a fallback.
/// The correction is `signum(demand - state) * min(|demand - state|, draw)`
/// -- magnitude clamped to the available draw, direction preserving which
/// way the state has to move. A `Backfeed` receipt records the state
/// around the update; if the origin lands within tolerance, the entity is
/// permanently marked resolved and a `Reconcile` receipt follows.
///
/// Returns the chosen entity and the magnitude actually applied, or
/// `None` for an empty mirror.
pub fn backfeed_and_reconcile(
    chain: &mut ChainArena,
    mirror: &mut MirrorArena,
    draw: f64,
    log: &mut ReceiptLog,
    step: u64,
) -> Option<(ErrorHandle, f64)> {
    let culprit = select_culprit(chain, mirror)?;
    if let Some(entity) = mirror.get_mut(culprit) {
        entity.is_culprit = true;
    }

    let (subject, origin_handle) = {
        let entity = mirror.get(culprit)?;
        (entity.id.clone(), entity.origin)
    };
    let origin = chain.get_mut(origin_handle)?;

    let err = origin.demand - origin.state;
    let correction = err.signum() * err.abs().min(draw);
    let before = origin.state;
    origin.state += correction;
    let after = origin.state;
    log.emit(
        step,
        ReceiptKind::Backfeed,
        &subject,
        "apply correction from reservoir",
        before,
        after,
    );

    if !origin.violates_tolerance() {
        if let Some(entity) = mirror.get_mut(culprit) {
            entity.resolved = true;
        }
        debug!(step, subject = %subject, "culprit reconciled");
        log.emit(
            step,
            ReceiptKind::Reconcile,
            &subject,
            "culprit within tolerance; local reconciliation",
            0.0,
            0.0,
        );
    }

    Some((culprit, correction.abs()))
}

/// First unresolved mirror entity whose origin violates tolerance, else
/// the tail. Resolution is permanent, so a resolved entity is never
/// re-examined even if its origin drifts out of tolerance again.
fn select_culprit(chain: &ChainArena, mirror: &MirrorArena) -> Option<ErrorHandle> {
    let violator = mirror.walk_downstream().find(|&handle| {
        mirror.get(handle).is_some_and(|entity| {
            !entity.resolved
                && chain
                    .get(entity.origin)
                    .is_some_and(ChainEntity::violates_tolerance)
        })
    });
    violator.or_else(|| mirror.tail())
}
