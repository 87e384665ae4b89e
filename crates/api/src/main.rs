//! GymKeep API server

use anyhow::{Context, Result};
use gymkeep_api::{create_router, telemetry, AppState, Config};
use gymkeep_shared::{create_pool, run_migrations};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Invalid configuration")?;
    telemetry::init(config.log_format);

    info!(bind_address = %config.bind_address, "Starting GymKeep API");

    let pool = create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to create database pool")?;
    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let app = create_router(AppState::from_config(&config, pool));

    let listener = TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;

    info!(bind_address = %config.bind_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!(error = %e, "Failed to install shutdown handler");
            std::future::pending::<()>().await;
        }
    }
}
