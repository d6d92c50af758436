//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod claim_repo;

pub use claim_repo::{ClaimAttempt, ClaimRepo};
