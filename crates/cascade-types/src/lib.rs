//! Shared type definitions for the Cascade reconciliation engine.
//!
//! This crate is the single source of truth for the types that cross the
//! boundary between the core engine and its transport-layer consumers:
//! audit receipts, tunable parameters, and state snapshots. No behavior
//! lives here -- only plain serde-serializable data.
//!
//! # Modules
//!
//! - [`receipt`] -- Typed audit-trail receipts emitted by every
//!   state-affecting operation
//! - [`params`] -- Tunable simulation parameters and the patch type used
//!   to update them at runtime
//! - [`snapshot`] -- The value-copy snapshot served to observers

pub mod params;
pub mod receipt;
pub mod snapshot;

// Re-export all public types at crate root for convenience.
pub use params::{Params, ParamsPatch};
pub use receipt::{Receipt, ReceiptKind};
pub use snapshot::SimSnapshot;
