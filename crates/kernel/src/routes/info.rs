//! Privacy policy, terms and about-us pages.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::get,
};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{InfoKind, InfoPage};
use crate::routes::helpers::{ApiResponse, require_text};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InfoRequest {
    pub content: String,
}

async fn read_page(state: &AppState, kind: InfoKind) -> AppResult<ApiResponse<InfoPage>> {
    let page = InfoPage::find(state.db(), kind)
        .await?
        .ok_or_else(|| AppError::not_found(kind.title()))?;

    Ok(ApiResponse::ok(format!("{} retrieved", kind.title()), page))
}

async fn write_page(
    state: &AppState,
    caller: AuthUser,
    kind: InfoKind,
    body: Result<Json<InfoRequest>, JsonRejection>,
) -> AppResult<ApiResponse<InfoPage>> {
    caller.require_admin()?;
    let Json(body) = body?;
    require_text(&body.content, "content")?;

    let page = InfoPage::upsert(state.db(), kind, &body.content, caller.id).await?;

    Ok(ApiResponse::ok(format!("{} saved", kind.title()), page))
}

/// GET /info/privacy
async fn get_privacy(State(state): State<AppState>) -> AppResult<ApiResponse<InfoPage>> {
    read_page(&state, InfoKind::Privacy).await
}

/// POST /info/privacy
async fn save_privacy(
    State(state): State<AppState>,
    caller: AuthUser,
    body: Result<Json<InfoRequest>, JsonRejection>,
) -> AppResult<ApiResponse<InfoPage>> {
    write_page(&state, caller, InfoKind::Privacy, body).await
}

/// GET /info/terms
async fn get_terms(State(state): State<AppState>) -> AppResult<ApiResponse<InfoPage>> {
    read_page(&state, InfoKind::Terms).await
}

/// POST /info/terms
async fn save_terms(
    State(state): State<AppState>,
    caller: AuthUser,
    body: Result<Json<InfoRequest>, JsonRejection>,
) -> AppResult<ApiResponse<InfoPage>> {
    write_page(&state, caller, InfoKind::Terms, body).await
}

/// GET /info/about-us
async fn get_about_us(State(state): State<AppState>) -> AppResult<ApiResponse<InfoPage>> {
    read_page(&state, InfoKind::AboutUs).await
}

/// POST /info/about-us
async fn save_about_us(
    State(state): State<AppState>,
    caller: AuthUser,
    body: Result<Json<InfoRequest>, JsonRejection>,
) -> AppResult<ApiResponse<InfoPage>> {
    write_page(&state, caller, InfoKind::AboutUs, body).await
}

/// Create the info pages router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/info/privacy", get(get_privacy).post(save_privacy))
        .route("/info/terms", get(get_terms).post(save_terms))
        .route("/info/about-us", get(get_about_us).post(save_about_us))
}
