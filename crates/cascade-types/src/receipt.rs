//! Audit-trail receipts.
//!
//! Every state-affecting operation in the engine appends one [`Receipt`]
//! to the simulation's receipt log. Receipts are immutable after creation
//! and totally ordered by `(step, emission order within step)`; together
//! they form the full audit trail of a run.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Receipt kind
// ---------------------------------------------------------------------------

/// The category of a state-affecting operation recorded in the audit trail.
///
/// Wire names match the historical JSON vocabulary, including the
/// `meta_totelevation` spelling for [`MetaBirth`].
///
/// [`MetaBirth`]: ReceiptKind::MetaBirth
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReceiptKind {
    /// A chain of entities was constructed.
    #[serde(rename = "spawn_chain")]
    SpawnChain,
    /// An error snapshot was injected into the reservoir.
    #[serde(rename = "inject")]
    Inject,
    /// An error occurrence was exponentially decayed.
    #[serde(rename = "diffuse")]
    Diffuse,
    /// Reservoir saturation spawned the corrective meta entity.
    /// Value pair is repurposed as `(total_error, saturation_limit)`.
    #[serde(rename = "meta_totelevation")]
    MetaBirth,
    /// Drawn reservoir energy was applied as a state correction.
    #[serde(rename = "backfeed")]
    Backfeed,
    /// A culprit came back within tolerance and was marked resolved.
    #[serde(rename = "reconcile")]
    Reconcile,
    /// Meta energy and reservoir error both collapsed below threshold.
    /// Emitted at most once per run.
    #[serde(rename = "quench")]
    Quench,
}

// ---------------------------------------------------------------------------
// Receipt
// ---------------------------------------------------------------------------

/// One immutable entry in the append-only audit trail.
///
/// `value_before` and `value_after` carry the affected quantity around the
/// operation; kinds that record a different pair document it on the variant
/// ([`ReceiptKind::MetaBirth`]). Kinds with no meaningful values leave both
/// at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// The step during which this receipt was emitted.
    pub step: u64,
    /// The category of operation.
    pub kind: ReceiptKind,
    /// The id of the entity the operation acted on.
    pub subject: String,
    /// Human-readable description of the operation.
    pub note: String,
    /// The affected value before the operation.
    pub value_before: f64,
    /// The affected value after the operation.
    pub value_after: f64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_with_wire_names() {
        let json = serde_json::to_string(&ReceiptKind::MetaBirth).unwrap();
        assert_eq!(json, "\"meta_totelevation\"");
        let json = serde_json::to_string(&ReceiptKind::Backfeed).unwrap();
        assert_eq!(json, "\"backfeed\"");
    }

    #[test]
    fn receipt_round_trips_through_json() {
        let receipt = Receipt {
            step: 3,
            kind: ReceiptKind::Inject,
            subject: String::from("B.err"),
            note: String::from("inject into reservoir"),
            value_before: 0.0,
            value_after: 0.35,
        };
        let json = serde_json::to_string(&receipt).unwrap();
        let back: Receipt = serde_json::from_str(&json).unwrap();
        assert_eq!(back, receipt);
    }
}
