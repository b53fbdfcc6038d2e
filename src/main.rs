use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ecom_events_api::config::AppConfig;
use ecom_events_api::database::{DatabaseManager, PgDatasetStore};
use ecom_events_api::{app, AppState};

/// Read-only HTTP access to the ecom_events dataset
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind; falls back to ECOM_API_PORT, then PORT
    #[arg(long)]
    port: Option<u16>,

    /// Resolve and validate configuration, then exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DB_* and API_KEY
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let args = Args::parse();

    // Resolved once; shared read-only from here on
    let config = AppConfig::from_env();
    config.validate().context("invalid configuration")?;
    tracing::info!("Starting ecom events API in {:?} mode", config.environment);


    let pool = DatabaseManager::connect_lazy(&config.database).context("failed to configure database pool")?;
    if args.check_config {
        println!("configuration ok");
        return Ok(());
    }

    let store = PgDatasetStore::new(pool.clone(), config.database.statement_timeout_ms);
    let state = AppState::new(config, Arc::new(store));

    if !state.guard.is_configured() {
        tracing::warn!("API_KEY is not set; all dataset requests will be rejected");
    }
    if state.limiter.is_none() {
        tracing::warn!("Rate limiting is disabled");
    }

    // Allow tests or deployments to override port via env
    let port = args
        .port
        .or_else(|| std::env::var("ECOM_API_PORT").ok().and_then(|s| s.parse().ok()))
        .or_else(|| std::env::var("PORT").ok().and_then(|s| s.parse().ok()))
        .unwrap_or(8000);

    let bind_addr = format!("{}:{}", args.host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Ecom events API listening on http://{}", bind_addr);

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    DatabaseManager::close(&pool).await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
