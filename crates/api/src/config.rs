use std::str::FromStr;
use std::time::Duration;

use warboard_core::claim::{ClaimPolicy, DEFAULT_CLAIM_TTL_SECS, DEFAULT_MAX_CLAIMS_PER_USER};
use warboard_core::target::{
    StatusPolicy, DEFAULT_ABOUT_TO_EXIT_SECS, DEFAULT_HOSPITAL_UNTIL_OFFSET_SECS,
    DEFAULT_IDLE_WINDOW_SECS, DEFAULT_MEDDING_HOLD_SECS, DEFAULT_MEDDING_MIN_EARLY_SECS,
    DEFAULT_ONLINE_WINDOW_SECS,
};
use warboard_torn::api::DEFAULT_BASE_URL;
use warboard_torn::rate_limit::DEFAULT_REQUESTS_PER_MINUTE;
use warboard_torn::source::TornConfig;

/// Where claims are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimBackend {
    /// Process-local map. Claims are lost on restart.
    Memory,
    /// Shared PostgreSQL table (`DATABASE_URL` required).
    Postgres,
}

impl FromStr for ClaimBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(ClaimBackend::Memory),
            "postgres" | "postgresql" => Ok(ClaimBackend::Postgres),
            other => Err(format!("unknown claim backend '{other}'")),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,

    pub claim_backend: ClaimBackend,
    pub database_url: Option<String>,
    pub claims: ClaimPolicy,
    /// Active expiry sweep interval in seconds (default: `15`).
    pub claim_sweep_interval_secs: u64,

    /// Snapshot freshness threshold (default: 2 s).
    pub cache_freshness: Duration,
    /// Background refresh tick in seconds; `0` disables it (default: `5`).
    pub background_refresh_secs: u64,
    pub status_policy: StatusPolicy,

    pub torn: TornConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                 |
    /// |------------------------------|-------------------------|
    /// | `HOST`                       | `0.0.0.0`               |
    /// | `PORT`                       | `8000`                  |
    /// | `CORS_ORIGINS`               | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`       | `30`                    |
    /// | `CLAIM_EXPIRY`               | `120`                   |
    /// | `MAX_CLAIMS_PER_USER`        | `3`                     |
    /// | `CLAIM_BACKEND`              | `memory`                |
    /// | `DATABASE_URL`               | unset                   |
    /// | `CLAIM_SWEEP_INTERVAL_SECS`  | `15`                    |
    /// | `CACHE_FRESHNESS_SECS`       | `2`                     |
    /// | `BACKGROUND_REFRESH_SECS`    | `5`                     |
    /// | `ENEMY_FACTION_IDS`          | empty                   |
    /// | `TORN_API_KEY(S)`            | empty                   |
    /// | `TORN_API_BASE`              | `https://api.torn.com`  |
    /// | `TORN_RATE_LIMIT_PER_MINUTE` | `90`                    |
    /// | `TORN_REQUEST_TIMEOUT_SECS`  | `10`                    |
    /// | `ABOUT_TO_EXIT_SECS`         | `30`                    |
    /// | `ONLINE_WINDOW_SECS`         | `120`                   |
    /// | `IDLE_WINDOW_SECS`           | `300`                   |
    /// | `MEDDING_MIN_EARLY_SECS`     | `60`                    |
    /// | `MEDDING_HOLD_SECS`          | `60`                    |
    /// | `HOSPITAL_UNTIL_OFFSET_SECS` | `3600`                  |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_parse("PORT", 8000);

        let cors_origins = split_list(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        let claim_backend: ClaimBackend = std::env::var("CLAIM_BACKEND")
            .unwrap_or_else(|_| "memory".into())
            .parse()
            .unwrap_or_else(|e| panic!("CLAIM_BACKEND must be 'memory' or 'postgres': {e}"));
        let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        let freshness_secs: f64 = env_parse("CACHE_FRESHNESS_SECS", 2.0);
        let cache_freshness = Duration::try_from_secs_f64(freshness_secs)
            .expect("CACHE_FRESHNESS_SECS must be a non-negative number");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 30),
            claim_backend,
            database_url,
            claims: checked_claim_policy(ClaimPolicy {
                ttl_secs: env_parse("CLAIM_EXPIRY", DEFAULT_CLAIM_TTL_SECS),
                max_per_claimer: env_parse("MAX_CLAIMS_PER_USER", DEFAULT_MAX_CLAIMS_PER_USER),
            }),
            claim_sweep_interval_secs: env_parse("CLAIM_SWEEP_INTERVAL_SECS", 15),
            cache_freshness,
            background_refresh_secs: env_parse("BACKGROUND_REFRESH_SECS", 5),
            status_policy: StatusPolicy {
                about_to_exit_secs: env_parse("ABOUT_TO_EXIT_SECS", DEFAULT_ABOUT_TO_EXIT_SECS),
                online_window_secs: env_parse("ONLINE_WINDOW_SECS", DEFAULT_ONLINE_WINDOW_SECS),
                idle_window_secs: env_parse("IDLE_WINDOW_SECS", DEFAULT_IDLE_WINDOW_SECS),
                medding_min_early_secs: env_parse(
                    "MEDDING_MIN_EARLY_SECS",
                    DEFAULT_MEDDING_MIN_EARLY_SECS,
                ),
                medding_hold_secs: env_parse("MEDDING_HOLD_SECS", DEFAULT_MEDDING_HOLD_SECS),
                hospital_until_offset_secs: env_parse(
                    "HOSPITAL_UNTIL_OFFSET_SECS",
                    DEFAULT_HOSPITAL_UNTIL_OFFSET_SECS,
                ),
            },
            torn: TornConfig {
                base_url: std::env::var("TORN_API_BASE").unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
                api_keys: api_keys_from_env(),
                faction_ids: faction_ids_from_env(),
                rate_limit_per_minute: env_parse(
                    "TORN_RATE_LIMIT_PER_MINUTE",
                    DEFAULT_REQUESTS_PER_MINUTE,
                ),
                request_timeout: Duration::from_secs(env_parse("TORN_REQUEST_TIMEOUT_SECS", 10)),
            },
        }
    }
}

/// Parse `name` into `T`, falling back to `default` when unset.
///
/// Panics with a descriptive message when the variable is set but invalid.
fn env_parse<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{name} must be a valid {}: {e}", std::any::type_name::<T>())),
        _ => default,
    }
}

/// Panics unless claims live for a positive time and each claimer may hold
/// at least one.
fn checked_claim_policy(policy: ClaimPolicy) -> ClaimPolicy {
    assert!(
        policy.ttl_secs > 0,
        "CLAIM_EXPIRY must be a positive number of seconds, got {}",
        policy.ttl_secs
    );
    assert!(
        policy.max_per_claimer > 0,
        "MAX_CLAIMS_PER_USER must be at least 1"
    );
    policy
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// `TORN_API_KEY` plus the comma-separated `TORN_API_KEYS`.
fn api_keys_from_env() -> Vec<String> {
    let mut keys = Vec::new();
    if let Ok(key) = std::env::var("TORN_API_KEY") {
        keys.extend(split_list(&key));
    }
    if let Ok(extra) = std::env::var("TORN_API_KEYS") {
        keys.extend(split_list(&extra));
    }
    keys
}

/// Comma-separated `ENEMY_FACTION_IDS`; entries that are not integers are
/// skipped with a warning.
fn faction_ids_from_env() -> Vec<i64> {
    let raw = std::env::var("ENEMY_FACTION_IDS").unwrap_or_default();
    parse_faction_ids(&raw)
}

fn parse_faction_ids(raw: &str) -> Vec<i64> {
    split_list(raw)
        .into_iter()
        .filter_map(|id| match id.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!(value = %id, "Ignoring invalid faction id in ENEMY_FACTION_IDS");
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_parse() {
        assert_eq!("memory".parse::<ClaimBackend>(), Ok(ClaimBackend::Memory));
        assert_eq!(" Postgres ".parse::<ClaimBackend>(), Ok(ClaimBackend::Postgres));
        assert!("redis".parse::<ClaimBackend>().is_err());
    }

    #[test]
    fn faction_ids_skip_garbage() {
        assert_eq!(parse_faction_ids("123, 456,,abc, 789"), vec![123, 456, 789]);
        assert!(parse_faction_ids("").is_empty());
    }

    #[test]
    fn claim_policy_accepts_positive_values() {
        let policy = ClaimPolicy {
            ttl_secs: 1,
            max_per_claimer: 1,
        };
        assert_eq!(checked_claim_policy(policy).ttl_secs, 1);
    }

    #[test]
    #[should_panic(expected = "CLAIM_EXPIRY")]
    fn non_positive_claim_ttl_is_rejected() {
        checked_claim_policy(ClaimPolicy {
            ttl_secs: 0,
            max_per_claimer: 3,
        });
    }

    #[test]
    #[should_panic(expected = "MAX_CLAIMS_PER_USER")]
    fn zero_claim_limit_is_rejected() {
        checked_claim_policy(ClaimPolicy {
            ttl_secs: 120,
            max_per_claimer: 0,
        });
    }

    #[test]
    fn list_splitting_trims_and_drops_empty() {
        assert_eq!(split_list(" a ,b,, c"), vec!["a", "b", "c"]);
    }
}
