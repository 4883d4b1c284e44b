//! Reimbursement API Server Binary
//!
//! This binary starts the HTTP API server for expense reimbursement claims.
//!
//! # Usage
//!
//! ```bash
//! # Run with the in-memory store
//! cargo run --bin reimbursement-api
//!
//! # Run against PostgreSQL
//! API_STORE_BACKEND=postgres API_DATABASE_URL=postgres://... cargo run --bin reimbursement-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_JWT_SECRET` - JWT signing secret (required in production)
//! * `API_JWT_EXPIRATION_SECS` - JWT token expiration in seconds (default: 3600)
//! * `API_DATABASE_URL` - PostgreSQL connection string
//! * `API_STORE_BACKEND` - `memory` or `postgres` (default: memory)
//! * `API_MAX_CAS_ATTEMPTS` - Conditional-write attempts per transition (default: 3)
//! * `API_MAX_BATCH_SIZE` - Largest claim batch accepted (default: 50)
//! * `API_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `API_LOG_FORMAT` - `pretty` or `json` (default: pretty)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_claims::{ClaimService, ClaimStore, InMemoryClaimStore};
use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresClaimStore};
use interface_api::config::{ApiConfig, LogFormat, StoreBackend};
use interface_api::create_router;

/// Main entry point for the API server.
///
/// Initializes logging, loads configuration, builds the claim store for the
/// configured backend, and starts the HTTP server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("loading configuration")?;
    config.validate()?;

    init_tracing(&config.log_level, config.log_format);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        backend = ?config.store_backend,
        "Starting reimbursement API server"
    );

    let store = build_store(&config).await?;
    let service = ClaimService::new(store).with_config(config.service_config());

    let app = create_router(service, config.clone());

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .context("parsing server address")?;

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Builds the claim store for the configured backend
async fn build_store(config: &ApiConfig) -> anyhow::Result<Arc<dyn ClaimStore>> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory claim store; data is lost on restart");
            Ok(Arc::new(InMemoryClaimStore::new()))
        }
        StoreBackend::Postgres => {
            let pool = create_pool(DatabaseConfig::new(config.database_url.clone()))
                .await
                .context("connecting to database")?;
            run_migrations(&pool).await.context("running migrations")?;
            tracing::info!("Database ready");
            Ok(Arc::new(PostgresClaimStore::new(pool)))
        }
    }
}

/// Initializes the tracing subscriber for structured logging.
fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
