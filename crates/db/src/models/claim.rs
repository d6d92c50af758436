//! Claim row model.

use serde::Serialize;
use sqlx::FromRow;
use warboard_core::claim::Claim;
use warboard_core::types::{EpochSecs, PlayerId};

/// A row from the `claims` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ClaimRow {
    pub target_id: PlayerId,
    pub target_name: String,
    pub claimer_id: PlayerId,
    pub claimer_name: String,
    pub claimed_at: EpochSecs,
    pub expires_at: EpochSecs,
}

impl From<ClaimRow> for Claim {
    fn from(row: ClaimRow) -> Self {
        Claim {
            target_id: row.target_id,
            target_name: row.target_name,
            claimer_id: row.claimer_id,
            claimer_name: row.claimer_name,
            claimed_at: row.claimed_at,
            expires_at: row.expires_at,
        }
    }
}
