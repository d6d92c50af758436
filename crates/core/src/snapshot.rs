//! Snapshot types: the cached target capture and the externally visible,
//! claim-annotated view built from it.

use serde::Serialize;

use crate::claim::Claim;
use crate::target::TargetStatus;
use crate::types::{EpochMillis, EpochSecs, PlayerId};

/// One complete upstream capture of the tracked roster.
///
/// Published atomically by the status cache; never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSnapshot {
    /// Monotonic publication counter (1 for the first successful refresh).
    pub seq: u64,
    pub captured_at_ms: EpochMillis,
    pub targets: Vec<TargetStatus>,
}

impl TargetSnapshot {
    pub fn captured_at_secs(&self) -> EpochSecs {
        self.captured_at_ms.div_euclid(1000)
    }

    /// Age in fractional seconds relative to `now_ms`.
    pub fn age_secs(&self, now_ms: EpochMillis) -> f64 {
        (now_ms - self.captured_at_ms).max(0) as f64 / 1000.0
    }

    pub fn find(&self, target_id: PlayerId) -> Option<&TargetStatus> {
        self.targets.iter().find(|t| t.user_id == target_id)
    }
}

/// A target joined with its claim, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedTarget {
    #[serde(flatten)]
    pub status: TargetStatus,
    pub claimed_by: Option<String>,
    pub claimed_by_id: Option<PlayerId>,
    pub claimed_at: Option<EpochSecs>,
    pub claim_expires: Option<EpochSecs>,
}

impl AnnotatedTarget {
    pub fn unclaimed(status: TargetStatus) -> Self {
        Self {
            status,
            claimed_by: None,
            claimed_by_id: None,
            claimed_at: None,
            claim_expires: None,
        }
    }

    pub fn claimed(status: TargetStatus, claim: &Claim) -> Self {
        Self {
            status,
            claimed_by: Some(claim.claimer_name.clone()),
            claimed_by_id: Some(claim.claimer_id),
            claimed_at: Some(claim.claimed_at),
            claim_expires: Some(claim.expires_at),
        }
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed_by_id.is_some()
    }
}

/// Cache metadata attached to every served snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotMeta {
    pub cache_age_seconds: f64,
    pub stale: bool,
    pub next_refresh_in: f64,
    pub max_claims_per_user: usize,
    pub api_calls_remaining: u32,
}

/// The status feed served to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub targets: Vec<AnnotatedTarget>,
    pub active_claims: Vec<Claim>,

    pub total_targets: usize,
    pub in_hospital: usize,
    pub out_of_hospital: usize,
    pub claimed: usize,
    pub traveling: usize,

    pub max_claims_per_user: usize,

    pub last_updated: EpochSecs,
    pub cache_age_seconds: f64,
    pub stale: bool,
    pub next_refresh_in: f64,
    pub api_calls_remaining: u32,
}

impl Snapshot {
    /// Assemble the served snapshot and its aggregate counts.
    pub fn assemble(
        capture: &TargetSnapshot,
        targets: Vec<AnnotatedTarget>,
        active_claims: Vec<Claim>,
        meta: SnapshotMeta,
    ) -> Self {
        let in_hospital = targets
            .iter()
            .filter(|t| t.status.hospital_status.is_hospitalized())
            .count();
        let claimed = targets.iter().filter(|t| t.is_claimed()).count();
        let traveling = targets.iter().filter(|t| t.status.traveling).count();

        Self {
            total_targets: targets.len(),
            in_hospital,
            out_of_hospital: targets.len() - in_hospital,
            claimed,
            traveling,
            targets,
            active_claims,
            max_claims_per_user: meta.max_claims_per_user,
            last_updated: capture.captured_at_secs(),
            cache_age_seconds: meta.cache_age_seconds,
            stale: meta.stale,
            next_refresh_in: meta.next_refresh_in,
            api_calls_remaining: meta.api_calls_remaining,
        }
    }
}
