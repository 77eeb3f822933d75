//! The capped append-only audit trail.
//!
//! Every state-affecting operation appends one [`Receipt`]; entries are
//! never modified or removed by the engine. To keep long-running
//! simulations bounded, the log retains a capped tail: when full, the
//! oldest entry is evicted and an eviction counter advances, so observers
//! can tell how much history scrolled out of the window.

use std::collections::VecDeque;

use cascade_types::{Receipt, ReceiptKind};

/// Default number of receipts retained before eviction begins.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Append-only receipt log with a bounded retained tail.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptLog {
    /// Retained receipts, oldest first.
    entries: VecDeque<Receipt>,
    /// Maximum number of retained receipts (>= 1).
    capacity: usize,
    /// Number of receipts evicted from the front so far.
    dropped: u64,
}

impl Default for ReceiptLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ReceiptLog {
    /// Create an empty log retaining at most `capacity` receipts.
    ///
    /// A capacity of zero is clamped to one so the latest receipt is
    /// always observable.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    /// Append a receipt, evicting the oldest entry if the log is full.
    pub fn push(&mut self, receipt: Receipt) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
        self.entries.push_back(receipt);
    }

    /// Convenience constructor-and-append for the common emission shape.
    pub fn emit(
        &mut self,
        step: u64,
        kind: ReceiptKind,
        subject: &str,
        note: &str,
        value_before: f64,
        value_after: f64,
    ) {
        self.push(Receipt {
            step,
            kind,
            subject: subject.to_owned(),
            note: note.to_owned(),
            value_before,
            value_after,
        });
    }

    /// Iterate the retained receipts, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Receipt> {
        self.entries.iter()
    }

    /// Clone the retained tail into a plain vector, oldest first.
    pub fn tail(&self) -> Vec<Receipt> {
        self.entries.iter().cloned().collect()
    }

    /// Number of retained receipts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log holds no receipts.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of receipts evicted from the front so far.
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// The configured retention capacity.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
