//! Realty Marketplace Kernel Library
//!
//! Listings, inquiries, favorites and subscription entitlements behind a
//! JSON API. The `realty` binary wires [`app`] to a TCP listener.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod query;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use axum::http::{HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;

/// Build the full application router around `state`.
pub fn app(state: AppState, config: &Config) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::auth::router())
        .merge(routes::user::router())
        .merge(routes::property::router())
        .merge(routes::contact::router())
        .merge(routes::favorite::router())
        .merge(routes::info::router())
        .merge(routes::subscription::router())
        .merge(routes::transaction::router())
        .merge(routes::payment_gateway::router())
        // Middleware layers (last added = first executed in request flow):
        // TraceLayer → CORS → bearer_auth → routes
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate_bearer_token,
        ))
        .layer(build_cors_layer(config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        // Credentials cannot be combined with a wildcard header list.
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
            ])
            .allow_credentials(true)
    }
}
