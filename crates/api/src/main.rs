use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warboard_core::claim::ClaimStore;
use warboard_core::memory_store::InMemoryClaimStore;
use warboard_core::reconcile::ClaimReconciler;
use warboard_core::time::{SystemTimeSource, TimeSource};
use warboard_db::claim_store::PgClaimStore;
use warboard_torn::source::TornSource;

use warboard_api::background;
use warboard_api::cache::StatusCache;
use warboard_api::config::{ClaimBackend, ServerConfig};
use warboard_api::router::build_app_router;
use warboard_api::state::AppState;

/// How long shutdown waits for each background task.
const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env();
    log_config(&config);

    let time: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);
    let claims = build_claim_store(&config).await;

    let source = TornSource::new(config.torn.clone())
        .unwrap_or_else(|e| panic!("Cannot build upstream HTTP client: {e}"));
    let cache = Arc::new(StatusCache::new(
        Arc::new(source),
        Arc::clone(&time),
        config.status_policy,
        config.cache_freshness,
    ));

    let shutdown = CancellationToken::new();
    let tasks = spawn_background_tasks(&config, &cache, &claims, &time, &shutdown);

    let app = build_app_router(
        AppState {
            config: Arc::new(config.clone()),
            cache,
            reconciler: ClaimReconciler::new(claims),
            time,
        },
        &config,
    );

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .unwrap_or_else(|e| panic!("Cannot bind {}:{}: {e}", config.host, config.port));
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Warboard API listening");
    }

    tokio::spawn(watch_signals(shutdown.clone()));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
        .expect("HTTP server failed");

    // serve() only returns after shutdown was requested or on error.
    shutdown.cancel();
    for task in tasks {
        if tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, task).await.is_err() {
            tracing::warn!("Background task did not stop in time");
        }
    }
    tracing::info!("Shutdown complete");
}

/// Install the global subscriber. `LOG_FORMAT=json` emits JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warboard_api=debug,warboard_torn=info,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn log_config(config: &ServerConfig) {
    tracing::info!(
        host = %config.host,
        port = config.port,
        claim_backend = ?config.claim_backend,
        claim_ttl_secs = config.claims.ttl_secs,
        max_claims = config.claims.max_per_claimer,
        freshness_ms = config.cache_freshness.as_millis() as u64,
        factions = config.torn.faction_ids.len(),
        api_keys = config.torn.api_keys.len(),
        "Configuration loaded"
    );
    if config.torn.api_keys.is_empty() {
        tracing::warn!("No TORN_API_KEY configured; status refreshes will fail");
    }
    if config.torn.faction_ids.is_empty() {
        tracing::warn!("No ENEMY_FACTION_IDS configured; the target list will be empty");
    }
}

/// Select the claim store. The postgres backend is connected, checked and
/// migrated before the server starts; any failure aborts startup.
async fn build_claim_store(config: &ServerConfig) -> Arc<dyn ClaimStore> {
    match config.claim_backend {
        ClaimBackend::Memory => {
            tracing::info!("Claims kept in process memory");
            Arc::new(InMemoryClaimStore::new(config.claims))
        }
        ClaimBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .expect("DATABASE_URL must be set when CLAIM_BACKEND=postgres");
            let pool = warboard_db::create_pool(url)
                .await
                .unwrap_or_else(|e| panic!("Cannot connect to the claims database: {e}"));
            warboard_db::health_check(&pool)
                .await
                .unwrap_or_else(|e| panic!("Claims database health check failed: {e}"));
            warboard_db::run_migrations(&pool)
                .await
                .unwrap_or_else(|e| panic!("Claims database migration failed: {e}"));
            tracing::info!("Claims stored in postgres");
            Arc::new(PgClaimStore::new(pool, config.claims))
        }
    }
}

/// Start the refresh and sweep loops. An interval of zero disables a loop.
fn spawn_background_tasks(
    config: &ServerConfig,
    cache: &Arc<StatusCache>,
    claims: &Arc<dyn ClaimStore>,
    time: &Arc<dyn TimeSource>,
    shutdown: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::new();

    if config.background_refresh_secs > 0 {
        tasks.push(tokio::spawn(background::refresh::run(
            Arc::clone(cache),
            Duration::from_secs(config.background_refresh_secs),
            shutdown.clone(),
        )));
    } else {
        tracing::info!("Background refresh disabled; refreshing on demand only");
    }

    if config.claim_sweep_interval_secs > 0 {
        tasks.push(tokio::spawn(background::claim_sweep::run(
            Arc::clone(claims),
            Arc::clone(time),
            Duration::from_secs(config.claim_sweep_interval_secs),
            shutdown.clone(),
        )));
    }

    tasks
}

/// Cancel `shutdown` on SIGINT, or SIGTERM on unix.
async fn watch_signals(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!(signal = "SIGINT", "Shutting down"),
                    _ = sigterm.recv() => tracing::info!(signal = "SIGTERM", "Shutting down"),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot listen for SIGTERM; only Ctrl-C will stop the server");
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!(signal = "SIGINT", "Shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!(signal = "ctrl-c", "Shutting down");
    }

    shutdown.cancel();
}
