//! Repository for the `claims` table.

use sqlx::PgPool;
use warboard_core::claim::NewClaim;
use warboard_core::types::{EpochSecs, PlayerId};

use crate::models::claim::ClaimRow;

/// Column list for claims queries.
const COLUMNS: &str = "target_id, target_name, claimer_id, claimer_name, claimed_at, expires_at";

/// Outcome of [`ClaimRepo::try_claim`].
#[derive(Debug, Clone)]
pub enum ClaimAttempt {
    Created(ClaimRow),
    /// The claimer already holds the target.
    AlreadyHeld(ClaimRow),
    /// Another claimer holds the target.
    HeldByOther(ClaimRow),
    /// The claimer is at the limit.
    LimitReached,
    /// Other claimers kept taking and releasing the target.
    Contended,
}

/// Insert tries when the conflicting claim vanishes before it can be read.
const INSERT_ATTEMPTS: usize = 3;

/// Provides atomic claim operations.
pub struct ClaimRepo;

impl ClaimRepo {
    /// Claim a target in one transaction.
    ///
    /// A transaction-scoped advisory lock on the claimer id serializes the
    /// limit check with the insert for that claimer; the primary key on
    /// `target_id` plus `ON CONFLICT DO NOTHING` makes target exclusivity
    /// hold across claimers.
    pub async fn try_claim(
        pool: &PgPool,
        input: &NewClaim,
        now: EpochSecs,
        ttl_secs: i64,
        max_per_claimer: i64,
    ) -> Result<ClaimAttempt, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(input.claimer_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM claims WHERE target_id = $1 AND expires_at <= $2")
            .bind(input.target_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let select = format!("SELECT {COLUMNS} FROM claims WHERE target_id = $1");
        if let Some(existing) = sqlx::query_as::<_, ClaimRow>(&select)
            .bind(input.target_id)
            .fetch_optional(&mut *tx)
            .await?
        {
            tx.commit().await?;
            return Ok(if existing.claimer_id == input.claimer_id {
                ClaimAttempt::AlreadyHeld(existing)
            } else {
                ClaimAttempt::HeldByOther(existing)
            });
        }

        let (held,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM claims WHERE claimer_id = $1 AND expires_at > $2",
        )
        .bind(input.claimer_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        if held >= max_per_claimer {
            tx.commit().await?;
            return Ok(ClaimAttempt::LimitReached);
        }

        let insert = format!(
            "INSERT INTO claims (target_id, target_name, claimer_id, claimer_name, claimed_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (target_id) DO NOTHING
             RETURNING {COLUMNS}"
        );

        let mut attempt = ClaimAttempt::Contended;
        for _ in 0..INSERT_ATTEMPTS {
            let inserted = sqlx::query_as::<_, ClaimRow>(&insert)
                .bind(input.target_id)
                .bind(&input.target_name)
                .bind(input.claimer_id)
                .bind(&input.claimer_name)
                .bind(now)
                .bind(now + ttl_secs)
                .fetch_optional(&mut *tx)
                .await?;
            if let Some(row) = inserted {
                attempt = ClaimAttempt::Created(row);
                break;
            }

            // Lost the race to another claimer's insert. The winner may have
            // released again before this read; then the target is free.
            let winner = sqlx::query_as::<_, ClaimRow>(&select)
                .bind(input.target_id)
                .fetch_optional(&mut *tx)
                .await?;
            if let Some(row) = winner {
                attempt = ClaimAttempt::HeldByOther(row);
                break;
            }
        }
        tx.commit().await?;
        Ok(attempt)
    }

    /// Find the active claim on a target.
    pub async fn find_active(
        pool: &PgPool,
        target_id: PlayerId,
        now: EpochSecs,
    ) -> Result<Option<ClaimRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM claims WHERE target_id = $1 AND expires_at > $2");
        sqlx::query_as::<_, ClaimRow>(&query)
            .bind(target_id)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// List active claims ordered by claim time, then target id.
    pub async fn list_active(pool: &PgPool, now: EpochSecs) -> Result<Vec<ClaimRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM claims WHERE expires_at > $1 ORDER BY claimed_at ASC, target_id ASC"
        );
        sqlx::query_as::<_, ClaimRow>(&query)
            .bind(now)
            .fetch_all(pool)
            .await
    }

    /// Delete the active claim on a target if `claimer_id` holds it.
    pub async fn delete_held_by(
        pool: &PgPool,
        target_id: PlayerId,
        claimer_id: PlayerId,
        now: EpochSecs,
    ) -> Result<Option<ClaimRow>, sqlx::Error> {
        let query = format!(
            "DELETE FROM claims WHERE target_id = $1 AND claimer_id = $2 AND expires_at > $3
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ClaimRow>(&query)
            .bind(target_id)
            .bind(claimer_id)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Delete the active claim on a target regardless of holder.
    pub async fn delete_active(
        pool: &PgPool,
        target_id: PlayerId,
        now: EpochSecs,
    ) -> Result<Option<ClaimRow>, sqlx::Error> {
        let query = format!(
            "DELETE FROM claims WHERE target_id = $1 AND expires_at > $2 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ClaimRow>(&query)
            .bind(target_id)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Delete one specific grant. Returns `true` if a row was deleted.
    pub async fn delete_grant(
        pool: &PgPool,
        target_id: PlayerId,
        claimer_id: PlayerId,
        claimed_at: EpochSecs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM claims WHERE target_id = $1 AND claimer_id = $2 AND claimed_at = $3",
        )
        .bind(target_id)
        .bind(claimer_id)
        .bind(claimed_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every expired claim. Returns the number of rows removed.
    pub async fn delete_expired(pool: &PgPool, now: EpochSecs) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM claims WHERE expires_at <= $1")
            .bind(now)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
