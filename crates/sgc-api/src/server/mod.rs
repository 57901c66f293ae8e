//! Server setup and initialization
//!
//! Provides the main application builder and server runner.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sgc_cache::{MemoryRateLimitStore, RateLimitStore, RateLimiter, RateRules, RedisPool, RedisRateLimitStore};
use sgc_common::config::{DatabaseConfig, StorageBackend};
use sgc_common::{AppConfig, AppError};
use sgc_db::{create_pool, run_migrations, PoolConfig, Repositories};
use sgc_service::{
    mailer_from_config, spawn_cleanup_task, Mailer, MaintenanceService, SeedOutcome,
    ServiceContext,
};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::middleware::apply_middleware;
use crate::routes::create_router;
use crate::state::AppState;

/// How often idle in-process rate-limit counters are dropped
const RATE_LIMIT_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Build the complete Axum application with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    let router = create_router(&state);
    let router = apply_middleware(router, &state.config().cors, state.config().app.env.is_production());
    router.with_state(state)
}

/// Open the configured storage backend
pub async fn connect_repositories(config: &DatabaseConfig) -> Result<Repositories, AppError> {
    match config.backend {
        StorageBackend::Postgres => {
            info!("Connecting to PostgreSQL...");
            let pool_config = PoolConfig::from_config(config).map_err(|e| AppError::Config(e.to_string()))?;
            let pool = create_pool(&pool_config)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            info!("PostgreSQL connection established");

            run_migrations(&pool, &config.migrations_dir)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            Ok(Repositories::postgres(pool))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; all data is lost on restart");
            Ok(Repositories::memory())
        }
    }
}

/// Initialize all dependencies around the given storage and mailer
pub async fn create_app_state_with(
    config: AppConfig,
    repos: Repositories,
    mailer: Arc<dyn Mailer>,
) -> Result<AppState, AppError> {
    let redis = match &config.redis {
        Some(redis_config) => {
            info!("Connecting to Redis...");
            let pool = RedisPool::from_config(redis_config).map_err(|e| AppError::Cache(e.to_string()))?;
            if let Err(e) = pool.health_check().await {
                warn!(error = %e, "Redis not reachable yet; rate limiting fails open until it is");
            }
            Some(pool)
        }
        None => None,
    };

    let store: Arc<dyn RateLimitStore> = match &redis {
        Some(pool) => Arc::new(RedisRateLimitStore::new(pool.clone())),
        None => {
            info!("REDIS_URL not set, using in-process rate limiting");
            Arc::new(MemoryRateLimitStore::new())
        }
    };
    let rules = RateRules::from_config(&config.rate_limit).map_err(|e| AppError::Config(e.to_string()))?;

    let service_context = ServiceContext::from_config(&config, repos, mailer);

    match MaintenanceService::new(&service_context).seed_dev_admin(&config).await {
        Ok(Some(SeedOutcome::Created(account))) => info!(user_id = account.id, "Dev admin seeded"),
        Ok(Some(SeedOutcome::Updated(account))) => info!(user_id = account.id, "Dev admin refreshed"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Dev admin seeding failed"),
    }

    if config.overrides_active() {
        warn!("Security overrides active: every request runs as a synthetic admin");
    }

    Ok(AppState::new(
        service_context,
        config,
        RateLimiter::new(store),
        rules,
        redis,
    ))
}

/// Initialize all dependencies and create AppState
pub async fn create_app_state(config: AppConfig) -> Result<AppState, AppError> {
    let repos = connect_repositories(&config.database).await?;
    let mailer = mailer_from_config(&config.mail).map_err(|e| AppError::Config(e.to_string()))?;
    create_app_state_with(config, repos, mailer).await
}

/// Serve `app` on an already bound listener until ctrl-c
pub async fn serve(listener: TcpListener, app: Router) -> Result<(), AppError> {
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Config(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Run the HTTP server
pub async fn run_server(app: Router, addr: &str) -> Result<(), AppError> {
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {}: {}", addr, e)))?;

    info!("Server listening on http://{}", addr);

    serve(listener, app).await
}

/// Run the complete server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr = config.api.address();
    let interval = Duration::from_secs(config.maintenance.cleanup_interval_secs.max(1));
    let grace_days = config.maintenance.grace_days;

    // Create app state
    let state = create_app_state(config).await?;

    let cleanup = spawn_cleanup_task(state.service_context().clone(), interval, grace_days);
    let prune = state.limiter().spawn_prune_task(RATE_LIMIT_PRUNE_INTERVAL);

    // Build application
    let app = create_app(state);

    // Run server
    let result = run_server(app, &addr).await;
    cleanup.abort();
    prune.abort();
    result
}
