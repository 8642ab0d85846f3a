//! Favorite routes.
//!
//! Every change to a favorite also moves the property's favorites counter,
//! in the same database transaction.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    routing::get,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::favorite::FAVORITE_SCHEMA;
use crate::models::{Favorite, FavoriteListing, Property};
use crate::query::{ListingRequest, Page, paginate};
use crate::routes::helpers::{ApiResponse, parse_id};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRequest {
    #[serde(alias = "property")]
    pub property_id: String,
}

/// Parse the property id and make sure the listing is live.
async fn live_property(state: &AppState, raw: &str) -> AppResult<Uuid> {
    let id = parse_id(raw, "property")?;
    Property::find_active(state.db(), id)
        .await?
        .map(|p| p.id)
        .ok_or_else(|| AppError::not_found("Property"))
}

/// POST /info/favorite
async fn add_favorite(
    State(state): State<AppState>,
    caller: AuthUser,
    body: Result<Json<FavoriteRequest>, JsonRejection>,
) -> AppResult<ApiResponse<Favorite>> {
    let Json(body) = body?;
    let property_id = live_property(&state, &body.property_id).await?;

    let mut tx = state.db().begin().await?;
    let favorite = Favorite::create(&mut tx, caller.id, property_id)
        .await?
        .ok_or_else(|| AppError::BadRequest("Property is already in favorites".to_string()))?;
    Property::adjust_favorites(&mut tx, property_id, 1).await?;
    tx.commit().await?;

    Ok(ApiResponse::created("Added to favorites", favorite))
}

/// GET /info/favorite
async fn list_favorites(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<ApiResponse<Page<FavoriteListing>>> {
    let request = ListingRequest::from_params(&params, &FAVORITE_SCHEMA);
    let builder = request
        .builder(&FAVORITE_SCHEMA)?
        .scoped_to("user_id", caller.id);
    let page = paginate(state.db(), &builder, &request.page).await?;

    Ok(ApiResponse::ok("Favorites retrieved", page))
}

/// DELETE /info/favorite
///
/// Removes the caller's favorite for the property named in the body.
async fn remove_favorite_for_property(
    State(state): State<AppState>,
    caller: AuthUser,
    body: Result<Json<FavoriteRequest>, JsonRejection>,
) -> AppResult<ApiResponse<()>> {
    let Json(body) = body?;
    let property_id = parse_id(&body.property_id, "property")?;

    let mut tx = state.db().begin().await?;
    Favorite::remove_for_property(&mut tx, caller.id, property_id)
        .await?
        .ok_or_else(|| AppError::not_found("Favorite"))?;
    Property::adjust_favorites(&mut tx, property_id, -1).await?;
    tx.commit().await?;

    Ok(ApiResponse::ok("Removed from favorites", ()))
}

/// GET /info/favorite/{id}
async fn get_favorite(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Favorite>> {
    let id = parse_id(&id, "favorite")?;

    let favorite = Favorite::find_own(state.db(), id, caller.id)
        .await?
        .ok_or_else(|| AppError::not_found("Favorite"))?;

    Ok(ApiResponse::ok("Favorite retrieved", favorite))
}

/// PATCH /info/favorite/{id}
///
/// Points the favorite at another property.
async fn update_favorite(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    body: Result<Json<FavoriteRequest>, JsonRejection>,
) -> AppResult<ApiResponse<Favorite>> {
    let id = parse_id(&id, "favorite")?;
    let Json(body) = body?;

    let current = Favorite::find_own(state.db(), id, caller.id)
        .await?
        .ok_or_else(|| AppError::not_found("Favorite"))?;
    let property_id = live_property(&state, &body.property_id).await?;
    if current.property_id == property_id {
        return Ok(ApiResponse::ok("Favorite updated", current));
    }

    let mut tx = state.db().begin().await?;
    let updated = Favorite::repoint(&mut tx, id, caller.id, property_id)
        .await?
        .ok_or_else(|| AppError::BadRequest("Property is already in favorites".to_string()))?;
    Property::adjust_favorites(&mut tx, current.property_id, -1).await?;
    Property::adjust_favorites(&mut tx, property_id, 1).await?;
    tx.commit().await?;

    Ok(ApiResponse::ok("Favorite updated", updated))
}

/// DELETE /info/favorite/{id}
async fn delete_favorite(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    let id = parse_id(&id, "favorite")?;

    let mut tx = state.db().begin().await?;
    let removed = Favorite::remove(&mut tx, id, caller.id)
        .await?
        .ok_or_else(|| AppError::not_found("Favorite"))?;
    Property::adjust_favorites(&mut tx, removed.property_id, -1).await?;
    tx.commit().await?;

    Ok(ApiResponse::ok("Removed from favorites", ()))
}

/// Create the favorites router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/info/favorite",
            get(list_favorites)
                .post(add_favorite)
                .delete(remove_favorite_for_property),
        )
        .route(
            "/info/favorite/{id}",
            get(get_favorite)
                .patch(update_favorite)
                .delete(delete_favorite),
        )
}
