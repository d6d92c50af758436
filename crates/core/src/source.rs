//! The upstream seam the status cache polls.

use async_trait::async_trait;

use crate::target::MemberRecord;

/// Failure to obtain a roster from upstream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Network failure, timeout, or non-success HTTP status.
    #[error("Upstream request failed: {0}")]
    Transport(String),

    /// Upstream answered with an error payload (bad key, rate limited, ...).
    #[error("Upstream API error {code}: {message}")]
    Api { code: i64, message: String },

    /// Upstream answered with something we could not parse.
    #[error("Malformed upstream payload: {0}")]
    Malformed(String),
}

/// A provider of the tracked roster.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetch every tracked member in one pass.
    async fn fetch_roster(&self) -> Result<Vec<MemberRecord>, SourceError>;

    /// Upstream requests still available in the current rate-limit window.
    async fn requests_remaining(&self) -> u32;
}
