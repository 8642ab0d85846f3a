//! HTTP route handlers.

pub mod auth;
pub mod contact;
pub mod favorite;
pub mod health;
pub mod helpers;
pub mod info;
pub mod payment_gateway;
pub mod property;
pub mod subscription;
pub mod transaction;
pub mod user;
