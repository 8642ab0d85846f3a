//! Realty Marketplace Kernel
//!
//! HTTP server entry point.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use realty_kernel::models::User;
use realty_kernel::{AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting realty kernel");

    let config = Config::from_env().context("failed to load configuration")?;
    info!(port = config.port, "Configuration loaded");

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    info!("Database connection established");

    seed_admin(&state, &config).await?;

    let app = realty_kernel::app(state, &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

/// Create the bootstrap admin from ADMIN_EMAIL / ADMIN_PASSWORD.
async fn seed_admin(state: &AppState, config: &Config) -> Result<()> {
    match (&config.admin_email, &config.admin_password) {
        (Some(email), Some(password)) => {
            if User::ensure_admin(state.db(), email, password)
                .await
                .context("failed to seed admin account")?
            {
                info!(email = %email, "Admin account created");
            }
        }
        (Some(_), None) => warn!("ADMIN_EMAIL is set without ADMIN_PASSWORD; skipping admin seed"),
        _ => {}
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
