//! Merging claim state into target snapshots.
//!
//! [`ClaimReconciler`] is the single read boundary for claims: it sweeps
//! expired claims, retires claims that no longer make sense for the current
//! roster, and annotates targets from one consistent claim listing.

use std::collections::HashMap;
use std::sync::Arc;

use crate::claim::{Claim, ClaimError, ClaimStore};
use crate::snapshot::{AnnotatedTarget, Snapshot, SnapshotMeta, TargetSnapshot};
use crate::target::TargetStatus;
use crate::types::{EpochSecs, PlayerId};

/// Attach each target's active claim, if any.
///
/// Pure merge; `claims` is expected to be already expiry-filtered.
pub fn annotate(targets: &[TargetStatus], claims: &[Claim]) -> Vec<AnnotatedTarget> {
    let by_target: HashMap<PlayerId, &Claim> = claims.iter().map(|c| (c.target_id, c)).collect();
    targets
        .iter()
        .map(|t| match by_target.get(&t.user_id) {
            Some(claim) => AnnotatedTarget::claimed(t.clone(), claim),
            None => AnnotatedTarget::unclaimed(t.clone()),
        })
        .collect()
}

/// Claims that should no longer exist given the current capture.
///
/// A claim is stale when its target is gone from a roster captured after the
/// claim was made, or when the target was seen entering hospital after the
/// claim was made (the hit landed). A capture no newer than the claim says
/// nothing about it: the claim may have been validated against a later one.
pub fn stale_claims(capture: &TargetSnapshot, claims: &[Claim]) -> Vec<Claim> {
    let captured_at = capture.captured_at_secs();
    claims
        .iter()
        .filter(|claim| match capture.find(claim.target_id) {
            None => claim.claimed_at < captured_at,
            Some(target) => {
                target.hospital_status.is_hospitalized()
                    && target
                        .hospitalized_at
                        .is_some_and(|at| at > claim.claimed_at)
            }
        })
        .cloned()
        .collect()
}

/// Read-time reconciliation of a [`ClaimStore`] against target captures.
#[derive(Clone)]
pub struct ClaimReconciler {
    store: Arc<dyn ClaimStore>,
}

impl ClaimReconciler {
    pub fn new(store: Arc<dyn ClaimStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ClaimStore> {
        &self.store
    }

    /// Sweep expired claims and list the rest.
    pub async fn current_claims(&self, now: EpochSecs) -> Result<Vec<Claim>, ClaimError> {
        let swept = self.store.sweep_expired(now).await?;
        if swept > 0 {
            tracing::debug!(swept, "Expired claims swept");
        }
        self.store.list_active(now).await
    }

    /// Sweep, retire stale claims, and return the active claim list as of a
    /// single store read.
    pub async fn active_claims(
        &self,
        capture: &TargetSnapshot,
        now: EpochSecs,
    ) -> Result<Vec<Claim>, ClaimError> {
        let claims = self.current_claims(now).await?;
        let stale = stale_claims(capture, &claims);
        if stale.is_empty() {
            return Ok(claims);
        }

        let retired = self.store.retire(&stale).await?;
        for claim in &stale {
            tracing::info!(
                target_id = claim.target_id,
                claimer_id = claim.claimer_id,
                snapshot_seq = capture.seq,
                "Retired claim on vanished or re-hospitalized target"
            );
        }
        tracing::debug!(retired, candidates = stale.len(), "Stale claims retired");

        // Re-read so the listing reflects one instant of store state.
        self.store.list_active(now).await
    }

    /// Build the served snapshot for `capture`.
    pub async fn reconcile(
        &self,
        capture: &TargetSnapshot,
        now: EpochSecs,
        meta: SnapshotMeta,
    ) -> Result<Snapshot, ClaimError> {
        let claims = self.active_claims(capture, now).await?;
        let targets = annotate(&capture.targets, &claims);
        Ok(Snapshot::assemble(capture, targets, claims, meta))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
