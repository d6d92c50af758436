//! [`StatusSource`] implementation that polls enemy faction rosters.

use std::time::Duration;

use async_trait::async_trait;
use warboard_core::source::{SourceError, StatusSource};
use warboard_core::target::MemberRecord;

use crate::api::{TornApi, TornApiError, DEFAULT_BASE_URL, KEY_EMPTY_CODE};
use crate::rate_limit::{KeyRing, RateLimiter, DEFAULT_REQUESTS_PER_MINUTE};

/// Default per-request upstream timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for [`TornSource`].
#[derive(Debug, Clone)]
pub struct TornConfig {
    pub base_url: String,
    pub api_keys: Vec<String>,
    pub faction_ids: Vec<i64>,
    pub rate_limit_per_minute: u32,
    pub request_timeout: Duration,
}

impl Default for TornConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_keys: Vec::new(),
            faction_ids: Vec::new(),
            rate_limit_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Polls every configured enemy faction and flattens the member lists.
pub struct TornSource {
    api: TornApi,
    faction_ids: Vec<i64>,
    keys: KeyRing,
    limiter: RateLimiter,
}

impl TornSource {
    pub fn new(config: TornConfig) -> Result<Self, TornApiError> {
        let api = TornApi::new(config.base_url, config.request_timeout)?;
        Ok(Self {
            api,
            faction_ids: config.faction_ids,
            keys: KeyRing::new(config.api_keys),
            limiter: RateLimiter::per_minute(config.rate_limit_per_minute),
        })
    }

    async fn fetch_faction(&self, faction_id: i64) -> Result<Vec<MemberRecord>, SourceError> {
        let key = self.keys.next_key().await.ok_or_else(|| SourceError::Api {
            code: KEY_EMPTY_CODE,
            message: "Key is empty".to_string(),
        })?;

        self.limiter.acquire().await;
        let faction = self
            .api
            .faction_basic(faction_id, &key)
            .await
            .map_err(|e| {
                tracing::warn!(faction_id, error = %e, "Faction fetch failed");
                SourceError::from(e)
            })?;

        tracing::debug!(
            faction_id,
            faction = %faction.name,
            members = faction.members.len(),
            "Faction roster fetched"
        );
        Ok(faction.into_members())
    }
}

#[async_trait]
impl StatusSource for TornSource {
    /// Fetch every configured faction in order.
    ///
    /// Any single faction failing fails the whole roster, so a published
    /// snapshot never silently drops a faction.
    async fn fetch_roster(&self) -> Result<Vec<MemberRecord>, SourceError> {
        let mut records = Vec::new();
        for &faction_id in &self.faction_ids {
            records.extend(self.fetch_faction(faction_id).await?);
        }
        Ok(records)
    }

    async fn requests_remaining(&self) -> u32 {
        self.limiter.requests_remaining().await
    }
}
