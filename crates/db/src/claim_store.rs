//! [`ClaimStore`] backed by Postgres.

use async_trait::async_trait;
use warboard_core::claim::{Claim, ClaimError, ClaimGrant, ClaimPolicy, ClaimStore, NewClaim};
use warboard_core::types::{EpochSecs, PlayerId};

use crate::repositories::{ClaimAttempt, ClaimRepo};
use crate::DbPool;

/// Claim store shared by every instance connected to the same database.
pub struct PgClaimStore {
    pool: DbPool,
    policy: ClaimPolicy,
}

impl PgClaimStore {
    pub fn new(pool: DbPool, policy: ClaimPolicy) -> Self {
        Self { pool, policy }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn backend_error(err: sqlx::Error) -> ClaimError {
    tracing::error!(error = %err, "Claim store query failed");
    ClaimError::Backend(err.to_string())
}

#[async_trait]
impl ClaimStore for PgClaimStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    fn policy(&self) -> ClaimPolicy {
        self.policy
    }

    async fn claim(&self, request: &NewClaim, now: EpochSecs) -> Result<ClaimGrant, ClaimError> {
        let attempt = ClaimRepo::try_claim(
            &self.pool,
            request,
            now,
            self.policy.ttl_secs,
            self.policy.max_per_claimer as i64,
        )
        .await
        .map_err(backend_error)?;

        match attempt {
            ClaimAttempt::Created(row) => Ok(ClaimGrant::Created(row.into())),
            ClaimAttempt::AlreadyHeld(row) => Ok(ClaimGrant::AlreadyHeld(row.into())),
            ClaimAttempt::HeldByOther(row) => {
                let existing = Claim::from(row);
                Err(ClaimError::AlreadyClaimed {
                    remaining_secs: existing.remaining_secs(now),
                    claimed_by: existing.claimer_name,
                })
            }
            ClaimAttempt::LimitReached => Err(ClaimError::ClaimLimitExceeded {
                max: self.policy.max_per_claimer,
            }),
            ClaimAttempt::Contended => {
                tracing::warn!(target_id = request.target_id, "Claim gave up on a contended target");
                Err(ClaimError::AlreadyClaimed {
                    claimed_by: "another claimer".to_string(),
                    remaining_secs: self.policy.ttl_secs,
                })
            }
        }
    }

    async fn release(
        &self,
        target_id: PlayerId,
        claimer_id: PlayerId,
        now: EpochSecs,
    ) -> Result<Claim, ClaimError> {
        if let Some(row) = ClaimRepo::delete_held_by(&self.pool, target_id, claimer_id, now)
            .await
            .map_err(backend_error)?
        {
            return Ok(row.into());
        }

        let holder = ClaimRepo::find_active(&self.pool, target_id, now)
            .await
            .map_err(backend_error)?
            .map(|row| row.claimer_name);
        Err(ClaimError::NotClaimedByYou { holder })
    }

    async fn force_release(&self, target_id: PlayerId, now: EpochSecs) -> Result<Claim, ClaimError> {
        ClaimRepo::delete_active(&self.pool, target_id, now)
            .await
            .map_err(backend_error)?
            .map(Claim::from)
            .ok_or(ClaimError::NotClaimedByYou { holder: None })
    }

    async fn list_active(&self, now: EpochSecs) -> Result<Vec<Claim>, ClaimError> {
        let rows = ClaimRepo::list_active(&self.pool, now)
            .await
            .map_err(backend_error)?;
        Ok(rows.into_iter().map(Claim::from).collect())
    }

    async fn sweep_expired(&self, now: EpochSecs) -> Result<usize, ClaimError> {
        let removed = ClaimRepo::delete_expired(&self.pool, now)
            .await
            .map_err(backend_error)?;
        Ok(removed as usize)
    }

    async fn retire(&self, claims: &[Claim]) -> Result<usize, ClaimError> {
        let mut removed = 0;
        for claim in claims {
            let deleted =
                ClaimRepo::delete_grant(&self.pool, claim.target_id, claim.claimer_id, claim.claimed_at)
                    .await
                    .map_err(backend_error)?;
            if deleted {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn health_check(&self) -> Result<(), ClaimError> {
        crate::health_check(&self.pool).await.map_err(backend_error)
    }
}
