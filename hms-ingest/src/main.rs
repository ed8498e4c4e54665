//! hms-ingest - Bulk upload ingestion service
//!
//! Imports helpdesk incidents and customers from client-parsed spreadsheets and
//! tracks each upload as a session.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hms_common::auth::StaticTokenValidator;
use hms_common::config::{Config, ConfigOverrides};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hms_ingest::{build_router, AppState};

/// Command-line arguments for hms-ingest
#[derive(Parser, Debug)]
#[command(name = "hms-ingest")]
#[command(about = "Bulk upload ingestion service for HMS")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "HMS_INGEST_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long, env = "HMS_INGEST_DATABASE")]
    database: Option<PathBuf>,

    /// Address to bind
    #[arg(short, long, env = "HMS_INGEST_BIND")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "HMS_INGEST_PORT")]
    port: Option<u16>,

    /// Largest accepted request body in bytes
    #[arg(long, env = "HMS_INGEST_MAX_BODY_BYTES")]
    max_body_bytes: Option<usize>,

    /// Accepted bearer tokens, comma separated (empty disables auth)
    #[arg(long, env = "HMS_INGEST_TOKENS", value_delimiter = ',')]
    tokens: Option<Vec<String>>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, env = "HMS_INGEST_LOG_LEVEL")]
    log_level: Option<String>,
}

impl From<Args> for ConfigOverrides {
    fn from(args: Args) -> Self {
        Self {
            config_path: args.config,
            database_path: args.database,
            bind_address: args.bind,
            port: args.port,
            max_body_bytes: args.max_body_bytes,
            auth_tokens: args.tokens,
            log_level: args.log_level,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::resolve(args.into()).context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting hms-ingest v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Database: {}", config.database_path.display());

    let db = hms_common::db::init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let validator = StaticTokenValidator::new(&config.auth_tokens);
    if validator.is_disabled() {
        warn!("No auth tokens configured; API authentication is disabled");
    } else {
        info!(tokens = config.auth_tokens.len(), "API authentication enabled");
    }

    let state = AppState::new(db.clone(), Arc::new(validator));
    let app = build_router(state, config.max_body_bytes);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
