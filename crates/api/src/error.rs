use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use warboard_core::claim::ClaimError;
use warboard_core::error::CoreError;

use crate::cache::CacheError;

/// Error type returned by every handler.
///
/// Renders as `{error, code}`; claim rejections additionally carry
/// `{success: false, message}` so clients can show the message as-is.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The request could not be parsed.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

pub type AppResult<T> = Result<T, AppError>;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl AppError {
    /// HTTP status, machine-readable code and client-facing message.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Core(CoreError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Claim(err) => claim_parts(err),
            AppError::Cache(CacheError::UpstreamUnavailable(msg)) => {
                tracing::warn!(error = %msg, "No snapshot available to serve");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "UPSTREAM_UNAVAILABLE",
                    "Target status is not available yet; upstream API unreachable".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let body = match self {
            AppError::Claim(_) => json!({
                "success": false,
                "message": message,
                "error": message,
                "code": code,
            }),
            _ => json!({
                "error": message,
                "code": code,
            }),
        };
        (status, Json(body)).into_response()
    }
}

fn claim_parts(err: &ClaimError) -> (StatusCode, &'static str, String) {
    let (status, code) = match err {
        ClaimError::AlreadyClaimed { .. } => (StatusCode::CONFLICT, "ALREADY_CLAIMED"),
        ClaimError::ClaimLimitExceeded { .. } => (StatusCode::CONFLICT, "CLAIM_LIMIT_EXCEEDED"),
        ClaimError::NotClaimedByYou { .. } => (StatusCode::FORBIDDEN, "NOT_CLAIMED_BY_YOU"),
        ClaimError::UnknownTarget(_) => (StatusCode::NOT_FOUND, "UNKNOWN_TARGET"),
        ClaimError::Backend(msg) => {
            tracing::error!(error = %msg, "Claim backend error");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                INTERNAL_MESSAGE.to_string(),
            );
        }
    };
    (status, code, err.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
