//! Configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result};

/// Minimum accepted length of `JWT_SECRET`, in bytes.
const MIN_JWT_SECRET_LEN: usize = 32;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// HMAC secret used to sign access tokens.
    pub jwt_secret: String,

    /// Access token lifetime in seconds (default: 86400).
    pub jwt_ttl_seconds: i64,

    /// Base URL under which uploaded files are served (default: /uploads).
    pub files_url: String,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// SMTP host for email delivery. When None, email is disabled.
    pub smtp_host: Option<String>,

    /// SMTP port (default: 587).
    pub smtp_port: u16,

    /// SMTP username for authentication.
    pub smtp_username: Option<String>,

    /// SMTP password for authentication.
    pub smtp_password: Option<String>,

    /// SMTP encryption mode: "starttls" (default), "tls", or "none".
    pub smtp_encryption: String,

    /// From address for outgoing email.
    pub smtp_from_email: String,

    /// Recipient of general contact-us submissions.
    pub contact_inbox_email: Option<String>,

    /// Public site URL for constructing links in emails.
    pub site_url: String,

    /// Bootstrap admin account, created at startup if missing.
    pub admin_email: Option<String>,

    pub admin_password: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = var("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url =
            var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let jwt_secret = var("JWT_SECRET").context("JWT_SECRET environment variable is required")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes");
        }

        let jwt_ttl_seconds = var("JWT_TTL_SECONDS")
            .unwrap_or_else(|| "86400".to_string())
            .parse()
            .context("JWT_TTL_SECONDS must be a valid i64")?;

        let files_url = var("FILES_URL")
            .unwrap_or_else(|| "/uploads".to_string())
            .trim_end_matches('/')
            .to_string();

        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|| vec!["*".to_string()]);

        let smtp_host = var("SMTP_HOST");

        let smtp_port = var("SMTP_PORT")
            .unwrap_or_else(|| "587".to_string())
            .parse()
            .context("SMTP_PORT must be a valid u16")?;

        let smtp_username = var("SMTP_USERNAME");
        let smtp_password = var("SMTP_PASSWORD");

        let smtp_encryption = var("SMTP_ENCRYPTION")
            .unwrap_or_else(|| "starttls".to_string())
            .to_lowercase();

        let smtp_from_email =
            var("SMTP_FROM_EMAIL").unwrap_or_else(|| "noreply@localhost".to_string());

        let contact_inbox_email = var("CONTACT_INBOX_EMAIL").filter(|v| !v.trim().is_empty());

        let site_url = var("SITE_URL").unwrap_or_else(|| format!("http://localhost:{port}"));

        let admin_email = var("ADMIN_EMAIL").filter(|v| !v.trim().is_empty());
        let admin_password = var("ADMIN_PASSWORD").filter(|v| !v.is_empty());

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            jwt_secret,
            jwt_ttl_seconds,
            files_url,
            cors_allowed_origins,
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            smtp_encryption,
            smtp_from_email,
            contact_inbox_email,
            site_url,
            admin_email,
            admin_password,
        })
    }
}
