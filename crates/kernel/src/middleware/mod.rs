//! HTTP middleware components.

pub mod bearer_auth;

pub use bearer_auth::{AuthUser, authenticate_bearer_token};
