//! Long-running loops spawned by `main`.
//!
//! Both stop when the shared shutdown [`CancellationToken`] fires.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod claim_sweep;
pub mod refresh;
