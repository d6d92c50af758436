//! Domain types and rules for the ranked-war tracker.
//!
//! Holds everything that does not need HTTP or a database: target status
//! derivation, claims and the claim store seam, snapshots, and read-time
//! reconciliation.

pub mod claim;
pub mod error;
pub mod memory_store;
pub mod reconcile;
pub mod snapshot;
pub mod source;
pub mod target;
pub mod time;
pub mod types;
