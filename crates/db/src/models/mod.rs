//! Row types for the claim tables.

pub mod claim;
