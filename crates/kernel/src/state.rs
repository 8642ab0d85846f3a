//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::services::email::EmailService;
use crate::services::token::TokenService;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// PostgreSQL connection pool.
    db: PgPool,

    /// Access token signing and verification.
    tokens: TokenService,

    /// Public prefix for stored upload paths.
    files_url: String,

    /// Where general contact messages are forwarded.
    contact_inbox_email: Option<String>,

    // --- Optional services (available when configured) ---
    /// SMTP email service (when SMTP_HOST is set).
    email: Option<Arc<EmailService>>,
}

impl AppState {
    /// Connect to the database, apply migrations and build the state.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = db::create_pool(config)
            .await
            .context("failed to create database pool")?;

        db::run_migrations(&db)
            .await
            .context("failed to run migrations")?;

        Ok(Self::with_pool(db, config))
    }

    /// Build the state around an existing pool.
    pub fn with_pool(db: PgPool, config: &Config) -> Self {
        let email = config.smtp_host.as_ref().and_then(|host| {
            match EmailService::new(
                host,
                config.smtp_port,
                config.smtp_username.as_deref(),
                config.smtp_password.as_deref(),
                &config.smtp_encryption,
                config.smtp_from_email.clone(),
                config.site_url.clone(),
            ) {
                Ok(svc) => {
                    info!(host = %host, port = config.smtp_port, "SMTP email service configured");
                    Some(Arc::new(svc))
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to initialize email service");
                    None
                }
            }
        });

        Self {
            inner: Arc::new(AppStateInner {
                db,
                tokens: TokenService::new(config.jwt_secret.as_bytes(), config.jwt_ttl_seconds),
                files_url: config.files_url.clone(),
                contact_inbox_email: config.contact_inbox_email.clone(),
                email,
            }),
        }
    }

    /// Get the database pool.
    pub fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    pub fn files_url(&self) -> &str {
        &self.inner.files_url
    }

    pub fn contact_inbox_email(&self) -> Option<&str> {
        self.inner.contact_inbox_email.as_deref()
    }

    /// Get the email service (if SMTP is configured).
    pub fn email(&self) -> Option<&Arc<EmailService>> {
        self.inner.email.as_ref()
    }

    /// Check if PostgreSQL is healthy.
    pub async fn postgres_healthy(&self) -> bool {
        db::check_health(&self.inner.db).await
    }
}
