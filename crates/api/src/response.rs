//! Response bodies shared by the claim handlers.

use serde::Serialize;
use warboard_core::claim::Claim;

/// `{ success, message, claim? }` returned by claim mutations.
#[derive(Debug, Serialize)]
pub struct ClaimActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim: Option<Claim>,
}

impl ClaimActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            claim: None,
        }
    }

    pub fn with_claim(message: impl Into<String>, claim: Claim) -> Self {
        Self {
            success: true,
            message: message.into(),
            claim: Some(claim),
        }
    }
}

/// `{ claims, count }` returned by `GET /api/claims`.
#[derive(Debug, Serialize)]
pub struct ClaimListResponse {
    pub count: usize,
    pub claims: Vec<Claim>,
}

impl From<Vec<Claim>> for ClaimListResponse {
    fn from(claims: Vec<Claim>) -> Self {
        Self {
            count: claims.len(),
            claims,
        }
    }
}
