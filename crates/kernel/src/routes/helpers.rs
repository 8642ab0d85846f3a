//! Shared route helpers: response envelope and input parsing.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;

/// Success envelope: `{message, status, statusCode, data}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub message: String,
    pub status: &'static str,
    pub status_code: u16,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::OK, message, data)
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::CREATED, message, data)
    }

    fn with_status(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            status: "OK",
            status_code: status.as_u16(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// Parse a path or body id, naming the entity on failure.
pub fn parse_id(raw: &str, entity: &str) -> Result<Uuid, AppError> {
    raw.trim()
        .parse::<Uuid>()
        .map_err(|_| AppError::BadRequest(format!("Invalid {entity} id")))
}

/// Reject a blank required string field.
pub fn require_text(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

/// Resolve an uploaded image reference to its stored path.
///
/// Bare file names are placed under `{files_url}/propertys/`; anything that
/// already looks like a path or URL is kept as given.
pub fn image_path(files_url: &str, image: &str) -> String {
    let image = image.trim();
    if image.starts_with('/') || image.contains("://") {
        image.to_string()
    } else {
        format!("{files_url}/propertys/{image}")
    }
}
