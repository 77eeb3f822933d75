//! Observer-facing state snapshot.

use serde::{Deserialize, Serialize};

use crate::receipt::Receipt;

/// A value copy of the simulation's observable state.
///
/// Produced under the controller lock and handed to observers by value;
/// no live references to mutable engine state ever leave the core. The
/// receipt list is the retained tail of the audit trail -- the log is
/// capped, and `receipts_dropped` counts entries evicted from the front.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimSnapshot {
    /// Number of ticks executed since construction or the last reset.
    pub step: u64,
    /// Sum of unresolved error energy across all reservoir occurrences.
    pub total_error: f64,
    /// Corrective energy held by the meta entity (0 while none exists).
    pub meta_energy: f64,
    /// The retained tail of the audit trail, in emission order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub receipts: Vec<Receipt>,
    /// Number of receipts evicted from the front of the capped log.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub receipts_dropped: u64,
}

/// Serde helper: skip the eviction counter while it is zero.
#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(n: &u64) -> bool {
    *n == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_omits_receipt_fields() {
        let snapshot = SimSnapshot::default();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("receipts"));
    }
}
