//! Hit claims: exclusive, time-limited reservations of one target by one
//! faction member, and the [`ClaimStore`] seam that holds them.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CoreError;
use crate::types::{EpochSecs, PlayerId};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default claim lifetime in seconds.
pub const DEFAULT_CLAIM_TTL_SECS: i64 = 120;

/// Default number of simultaneous claims one member may hold.
pub const DEFAULT_MAX_CLAIMS_PER_USER: usize = 3;

/// Maximum length of a claimer display name.
const MAX_CLAIMER_NAME_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An active reservation on a target.
///
/// Field names on the wire follow the frontend's expectations
/// (`claimed_by`, `claimed_by_id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claim {
    pub target_id: PlayerId,
    pub target_name: String,
    #[serde(rename = "claimed_by_id")]
    pub claimer_id: PlayerId,
    #[serde(rename = "claimed_by")]
    pub claimer_name: String,
    pub claimed_at: EpochSecs,
    pub expires_at: EpochSecs,
}

impl Claim {
    pub fn is_active(&self, now: EpochSecs) -> bool {
        self.expires_at > now
    }

    pub fn remaining_secs(&self, now: EpochSecs) -> i64 {
        (self.expires_at - now).max(0)
    }

    /// Whether `other` is the same grant (same holder, same creation time).
    pub fn same_grant(&self, other: &Claim) -> bool {
        self.target_id == other.target_id
            && self.claimer_id == other.claimer_id
            && self.claimed_at == other.claimed_at
    }
}

/// Input for [`ClaimStore::claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClaim {
    pub target_id: PlayerId,
    pub target_name: String,
    pub claimer_id: PlayerId,
    pub claimer_name: String,
}

impl NewClaim {
    /// Build the claim record granted at `now` under `policy`.
    pub fn grant_at(&self, now: EpochSecs, policy: &ClaimPolicy) -> Claim {
        Claim {
            target_id: self.target_id,
            target_name: self.target_name.clone(),
            claimer_id: self.claimer_id,
            claimer_name: self.claimer_name.clone(),
            claimed_at: now,
            expires_at: now + policy.ttl_secs,
        }
    }
}

/// Result of a successful claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimGrant {
    /// A new claim was created.
    Created(Claim),
    /// The caller already held this target; the existing claim is returned
    /// unchanged (expiry is not extended).
    AlreadyHeld(Claim),
}

impl ClaimGrant {
    pub fn claim(&self) -> &Claim {
        match self {
            ClaimGrant::Created(c) | ClaimGrant::AlreadyHeld(c) => c,
        }
    }

    pub fn into_claim(self) -> Claim {
        match self {
            ClaimGrant::Created(c) | ClaimGrant::AlreadyHeld(c) => c,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ClaimGrant::Created(_) => "Target claimed successfully",
            ClaimGrant::AlreadyHeld(_) => "Target already claimed by you",
        }
    }
}

/// Expiry and per-claimer limits applied by every store implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimPolicy {
    pub ttl_secs: i64,
    pub max_per_claimer: usize,
}

impl Default for ClaimPolicy {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_CLAIM_TTL_SECS,
            max_per_claimer: DEFAULT_MAX_CLAIMS_PER_USER,
        }
    }
}

/// Rejections from claim operations, surfaced to the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimError {
    #[error("Already claimed by {claimed_by} ({remaining_secs}s remaining)")]
    AlreadyClaimed {
        claimed_by: String,
        remaining_secs: i64,
    },

    #[error("Maximum {max} claims reached")]
    ClaimLimitExceeded { max: usize },

    #[error("{}", not_claimed_message(.holder))]
    NotClaimedByYou { holder: Option<String> },

    #[error("Target {0} is not in the tracked roster")]
    UnknownTarget(PlayerId),

    #[error("Claim storage error: {0}")]
    Backend(String),
}

fn not_claimed_message(holder: &Option<String>) -> String {
    match holder {
        Some(name) => format!("Claim belongs to {name}"),
        None => "No active claim on this target".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a player id supplied by a caller.
pub fn validate_player_id(field: &str, id: PlayerId) -> Result<(), CoreError> {
    if id <= 0 {
        return Err(CoreError::Validation(format!(
            "{field} must be a positive integer"
        )));
    }
    Ok(())
}

/// Validate a claimer display name.
///
/// Rules:
/// - Must not be blank.
/// - Must not exceed `MAX_CLAIMER_NAME_LEN` characters.
pub fn validate_claimer_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(
            "claimer_name must not be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_CLAIMER_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "claimer_name must not exceed {MAX_CLAIMER_NAME_LEN} characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Store seam
// ---------------------------------------------------------------------------

/// Shared claim state.
///
/// Implementations must make the target-exclusivity check, the per-claimer
/// count check, and the insert one atomic step, and must never return a
/// claim whose `expires_at <= now` from a read.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Short backend name for diagnostics (`"memory"`, `"postgres"`).
    fn backend(&self) -> &'static str;

    /// Limits this store enforces.
    fn policy(&self) -> ClaimPolicy;

    /// Claim a target for `request.claimer_id`.
    async fn claim(&self, request: &NewClaim, now: EpochSecs) -> Result<ClaimGrant, ClaimError>;

    /// Release the caller's own claim. Returns the released claim.
    async fn release(
        &self,
        target_id: PlayerId,
        claimer_id: PlayerId,
        now: EpochSecs,
    ) -> Result<Claim, ClaimError>;

    /// Release the caller's claim after the attack landed. Same rules as
    /// [`release`](Self::release).
    async fn resolve(
        &self,
        target_id: PlayerId,
        claimer_id: PlayerId,
        now: EpochSecs,
    ) -> Result<Claim, ClaimError> {
        self.release(target_id, claimer_id, now).await
    }

    /// Release a claim regardless of holder. Returns the released claim.
    async fn force_release(&self, target_id: PlayerId, now: EpochSecs) -> Result<Claim, ClaimError>;

    /// All active claims, ordered by `claimed_at` then `target_id`.
    async fn list_active(&self, now: EpochSecs) -> Result<Vec<Claim>, ClaimError>;

    /// Remove every claim with `expires_at <= now`. Returns the count removed.
    async fn sweep_expired(&self, now: EpochSecs) -> Result<usize, ClaimError>;

    /// Remove each given claim if the store still holds that exact grant.
    /// Returns the count removed.
    async fn retire(&self, claims: &[Claim]) -> Result<usize, ClaimError>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> Result<(), ClaimError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
