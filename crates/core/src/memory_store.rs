//! Process-local [`ClaimStore`] backed by a mutex-guarded map.
//!
//! Every operation takes the lock exactly once and never awaits while
//! holding it, so a claim's check-then-insert is a single critical section.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::claim::{Claim, ClaimError, ClaimGrant, ClaimPolicy, ClaimStore, NewClaim};
use crate::types::{EpochSecs, PlayerId};

/// In-memory claim store for single-instance deployments and tests.
pub struct InMemoryClaimStore {
    policy: ClaimPolicy,
    claims: Mutex<HashMap<PlayerId, Claim>>,
}

impl InMemoryClaimStore {
    pub fn new(policy: ClaimPolicy) -> Self {
        Self {
            policy,
            claims: Mutex::new(HashMap::new()),
        }
    }
}

/// Drop expired entries from the map. Returns the count removed.
fn purge_expired(claims: &mut HashMap<PlayerId, Claim>, now: EpochSecs) -> usize {
    let before = claims.len();
    claims.retain(|_, c| c.is_active(now));
    before - claims.len()
}

fn sorted(claims: &HashMap<PlayerId, Claim>) -> Vec<Claim> {
    let mut list: Vec<Claim> = claims.values().cloned().collect();
    list.sort_by_key(|c| (c.claimed_at, c.target_id));
    list
}

/// Remove the claim on `target_id` if `claimer_id` holds it.
fn take_own(
    claims: &mut HashMap<PlayerId, Claim>,
    target_id: PlayerId,
    claimer_id: PlayerId,
) -> Result<Claim, ClaimError> {
    match claims.get(&target_id) {
        None => Err(ClaimError::NotClaimedByYou { holder: None }),
        Some(existing) if existing.claimer_id != claimer_id => Err(ClaimError::NotClaimedByYou {
            holder: Some(existing.claimer_name.clone()),
        }),
        Some(_) => claims
            .remove(&target_id)
            .ok_or(ClaimError::NotClaimedByYou { holder: None }),
    }
}

#[async_trait]
impl ClaimStore for InMemoryClaimStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn policy(&self) -> ClaimPolicy {
        self.policy
    }

    async fn claim(&self, request: &NewClaim, now: EpochSecs) -> Result<ClaimGrant, ClaimError> {
        let mut claims = self.claims.lock().await;
        purge_expired(&mut claims, now);

        if let Some(existing) = claims.get(&request.target_id) {
            if existing.claimer_id == request.claimer_id {
                return Ok(ClaimGrant::AlreadyHeld(existing.clone()));
            }
            return Err(ClaimError::AlreadyClaimed {
                claimed_by: existing.claimer_name.clone(),
                remaining_secs: existing.remaining_secs(now),
            });
        }

        let held = claims
            .values()
            .filter(|c| c.claimer_id == request.claimer_id)
            .count();
        if held >= self.policy.max_per_claimer {
            return Err(ClaimError::ClaimLimitExceeded {
                max: self.policy.max_per_claimer,
            });
        }

        let claim = request.grant_at(now, &self.policy);
        claims.insert(claim.target_id, claim.clone());
        Ok(ClaimGrant::Created(claim))
    }

    async fn release(
        &self,
        target_id: PlayerId,
        claimer_id: PlayerId,
        now: EpochSecs,
    ) -> Result<Claim, ClaimError> {
        let mut claims = self.claims.lock().await;
        purge_expired(&mut claims, now);
        take_own(&mut claims, target_id, claimer_id)
    }

    async fn force_release(&self, target_id: PlayerId, now: EpochSecs) -> Result<Claim, ClaimError> {
        let mut claims = self.claims.lock().await;
        purge_expired(&mut claims, now);
        claims
            .remove(&target_id)
            .ok_or(ClaimError::NotClaimedByYou { holder: None })
    }

    async fn list_active(&self, now: EpochSecs) -> Result<Vec<Claim>, ClaimError> {
        let mut claims = self.claims.lock().await;
        purge_expired(&mut claims, now);
        Ok(sorted(&claims))
    }

    async fn sweep_expired(&self, now: EpochSecs) -> Result<usize, ClaimError> {
        let mut claims = self.claims.lock().await;
        Ok(purge_expired(&mut claims, now))
    }

    async fn retire(&self, stale: &[Claim]) -> Result<usize, ClaimError> {
        let mut claims = self.claims.lock().await;
        let mut removed = 0;
        for claim in stale {
            let still_held = claims
                .get(&claim.target_id)
                .is_some_and(|current| current.same_grant(claim));
            if still_held {
                claims.remove(&claim.target_id);
                removed += 1;
            }
        }
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
