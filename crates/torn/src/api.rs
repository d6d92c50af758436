//! REST client for the upstream game API.
//!
//! Wraps the faction endpoint using [`reqwest`]. Upstream reports
//! application errors inside a 200 response (`{"error": {...}}`), so every
//! body is checked for the error envelope before it is decoded.

use std::time::Duration;

use warboard_core::source::SourceError;

use crate::payload::{ErrorEnvelope, FactionBasic};

/// Default upstream base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.torn.com";

/// Upstream error code for a missing key.
pub const KEY_EMPTY_CODE: i64 = 1;

/// Upstream error code for a wrong key.
pub const INCORRECT_KEY_CODE: i64 = 2;

/// Upstream error code for a rate-limited key.
pub const TOO_MANY_REQUESTS_CODE: i64 = 5;

/// Errors from the upstream REST layer.
#[derive(Debug, thiserror::Error)]
pub enum TornApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Upstream returned a non-2xx status code.
    #[error("Upstream HTTP error ({status}): {body}")]
    Status { status: u16, body: String },

    /// Upstream returned its error envelope.
    #[error("Upstream API error {code}: {message}")]
    Api { code: i64, message: String },

    /// The body was not the JSON we expected.
    #[error("Malformed upstream payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<TornApiError> for SourceError {
    fn from(err: TornApiError) -> Self {
        match err {
            TornApiError::Request(e) => SourceError::Transport(e.to_string()),
            TornApiError::Status { status, body } => {
                SourceError::Transport(format!("HTTP {status}: {body}"))
            }
            TornApiError::Api { code, message } => SourceError::Api { code, message },
            TornApiError::Decode(e) => SourceError::Malformed(e.to_string()),
        }
    }
}

/// HTTP client for the upstream API.
#[derive(Clone)]
pub struct TornApi {
    client: reqwest::Client,
    base_url: String,
}

impl TornApi {
    /// Create a client with its own connection pool and request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TornApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the basic faction record, including its member list.
    ///
    /// Sends `GET /faction/{faction_id}?selections=basic&key=...`.
    pub async fn faction_basic(
        &self,
        faction_id: i64,
        api_key: &str,
    ) -> Result<FactionBasic, TornApiError> {
        let response = self
            .client
            .get(format!("{}/faction/{}", self.base_url, faction_id))
            .query(&[("selections", "basic"), ("key", api_key)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TornApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_body(&body)
    }
}

/// Decode an upstream body, surfacing the error envelope as [`TornApiError::Api`].
pub fn parse_body<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, TornApiError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if value.get("error").is_some() {
        let envelope: ErrorEnvelope = serde_json::from_value(value)?;
        return Err(TornApiError::Api {
            code: envelope.error.code,
            message: envelope.error.error,
        });
    }
    Ok(serde_json::from_value(value)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
