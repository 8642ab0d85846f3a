//! Property listing routes.
//!
//! Searches go through the listing query engine; every write that adds
//! images is checked against the owner's image allowance.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::property::{NewProperty, PROPERTY_SCHEMA, PropertyChanges};
use crate::models::{Property, PropertyListing};
use crate::query::{ListingRequest, Page, paginate};
use crate::routes::helpers::{ApiResponse, image_path, parse_id, require_text};
use crate::services::entitlement::{self, ImageAllowance};
use crate::state::AppState;

/// Single property with derived figures.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDetail {
    #[serde(flatten)]
    pub listing: PropertyListing,
    pub price_per_sq_ft: Option<f64>,
}

/// Property edit body: field changes plus images to append.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePropertyRequest {
    #[serde(flatten)]
    pub changes: PropertyChanges,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadImageRequest {
    pub image: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteImageRequest {
    pub image_path: String,
}

/// Load an active property the caller may modify.
async fn load_owned(state: &AppState, caller: &AuthUser, raw_id: &str) -> AppResult<Property> {
    let id = parse_id(raw_id, "property")?;
    let property = Property::find_active(state.db(), id)
        .await?
        .ok_or_else(|| AppError::not_found("Property"))?;
    caller.require_owner_or_admin(property.created_by)?;
    Ok(property)
}

/// Append images within the allowance.
///
/// The write re-checks the count, so a concurrent upload that wins the race
/// turns this one into a quota error instead of an over-quota listing.
async fn append_images(
    state: &AppState,
    conn: &mut PgConnection,
    property: &Property,
    allowance: ImageAllowance,
    images: &[String],
) -> AppResult<Property> {
    if let Some(updated) =
        Property::append_images(conn, property.id, images, allowance.limit).await?
    {
        return Ok(updated);
    }

    if Property::find_active(state.db(), property.id).await?.is_none() {
        return Err(AppError::not_found("Property"));
    }
    Err(allowance.exceeded().into())
}

fn resolve_images(state: &AppState, images: &[String]) -> Vec<String> {
    images
        .iter()
        .filter(|i| !i.trim().is_empty())
        .map(|i| image_path(state.files_url(), i))
        .collect()
}

/// GET /property/all
async fn list_properties(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<ApiResponse<Page<PropertyListing>>> {
    let request = ListingRequest::from_params(&params, &PROPERTY_SCHEMA);
    let page = request.fetch(state.db(), &PROPERTY_SCHEMA).await?;

    Ok(ApiResponse::ok("Properties retrieved", page))
}

/// GET /property/selp/all
///
/// The caller's own listings, with the same filters as the public search.
async fn list_own_properties(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<ApiResponse<Page<PropertyListing>>> {
    caller.require_agent_or_admin()?;

    let request = ListingRequest::from_params(&params, &PROPERTY_SCHEMA);
    let builder = request
        .builder(&PROPERTY_SCHEMA)?
        .scoped_to("created_by", caller.id);
    let page = paginate(state.db(), &builder, &request.page).await?;

    Ok(ApiResponse::ok("Properties retrieved", page))
}

/// POST /property/create
async fn create_property(
    State(state): State<AppState>,
    caller: AuthUser,
    body: Result<Json<NewProperty>, JsonRejection>,
) -> AppResult<ApiResponse<Property>> {
    let Json(mut body) = body?;

    require_text(&body.title, "title")?;
    if body.price < 0.0 {
        return Err(AppError::BadRequest("price must not be negative".to_string()));
    }

    body.images = resolve_images(&state, &body.images);
    if body.images.is_empty() {
        return Err(AppError::BadRequest(
            "At least one image is required".to_string(),
        ));
    }

    let allowance = entitlement::image_allowance(state.db(), caller.id).await?;
    allowance.check(0, body.images.len())?;

    let property = Property::create(state.db(), caller.id, body).await?;
    info!(property_id = %property.id, owner = %caller.id, "property created");

    Ok(ApiResponse::created("Property created", property))
}

/// GET /property/{id}
async fn get_property(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PropertyDetail>> {
    let id = parse_id(&id, "property")?;

    let listing = PropertyListing::find(state.db(), id)
        .await?
        .ok_or_else(|| AppError::not_found("Property"))?;

    let detail = PropertyDetail {
        price_per_sq_ft: listing.price_per_sq_ft(),
        listing,
    };

    Ok(ApiResponse::ok("Property retrieved", detail))
}

/// PATCH /property/{id}
async fn update_property(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    body: Result<Json<UpdatePropertyRequest>, JsonRejection>,
) -> AppResult<ApiResponse<Property>> {
    let Json(body) = body?;

    if let Some(title) = &body.changes.title {
        require_text(title, "title")?;
    }
    if body.changes.price.is_some_and(|price| price < 0.0) {
        return Err(AppError::BadRequest("price must not be negative".to_string()));
    }

    let property = load_owned(&state, &caller, &id).await?;

    let images = resolve_images(&state, &body.images);
    let allowance = if images.is_empty() {
        None
    } else {
        let allowance = entitlement::image_allowance(state.db(), property.created_by).await?;
        allowance.check(property.images.len(), images.len())?;
        Some(allowance)
    };

    // Field edits and new images commit together or not at all.
    let mut tx = state.db().begin().await?;

    let mut updated = Property::update(&mut tx, property.id, body.changes)
        .await?
        .ok_or_else(|| AppError::not_found("Property"))?;

    if let Some(allowance) = allowance {
        updated = append_images(&state, &mut tx, &updated, allowance, &images).await?;
    }

    tx.commit().await?;

    info!(property_id = %updated.id, by = %caller.id, "property updated");

    Ok(ApiResponse::ok("Property updated", updated))
}

/// DELETE /property/{id}
async fn delete_property(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    let property = load_owned(&state, &caller, &id).await?;

    if !Property::soft_delete(state.db(), property.id).await? {
        return Err(AppError::not_found("Property"));
    }

    info!(property_id = %property.id, by = %caller.id, "property deleted");

    Ok(ApiResponse::ok("Property deleted", ()))
}

/// POST /property/{id}/upload-image
async fn upload_image(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    body: Result<Json<UploadImageRequest>, JsonRejection>,
) -> AppResult<ApiResponse<Property>> {
    let Json(body) = body?;
    require_text(&body.image, "image")?;

    let property = load_owned(&state, &caller, &id).await?;
    let allowance = entitlement::image_allowance(state.db(), property.created_by).await?;
    allowance.check(property.images.len(), 1)?;

    let images = vec![image_path(state.files_url(), &body.image)];
    let mut conn = state.db().acquire().await?;
    let updated = append_images(&state, &mut conn, &property, allowance, &images).await?;

    Ok(ApiResponse::ok("Image uploaded", updated))
}

/// DELETE /property/{id}/delete-image
async fn delete_image(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    body: Result<Json<DeleteImageRequest>, JsonRejection>,
) -> AppResult<ApiResponse<Property>> {
    let Json(body) = body?;
    require_text(&body.image_path, "imagePath")?;

    let property = load_owned(&state, &caller, &id).await?;
    let updated = Property::remove_image(state.db(), property.id, body.image_path.trim())
        .await?
        .ok_or_else(|| AppError::not_found("Image"))?;

    Ok(ApiResponse::ok("Image deleted", updated))
}

/// POST /property/{id}/bost
async fn boost_property(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Property>> {
    let property_id: Uuid = parse_id(&id, "property")?;

    let boosted = entitlement::boost_property(state.db(), caller.id, property_id).await?;

    Ok(ApiResponse::ok("Property boosted", boosted))
}

/// Create the property router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/property/all", get(list_properties))
        .route("/property/selp/all", get(list_own_properties))
        .route("/property/create", post(create_property))
        .route(
            "/property/{id}",
            get(get_property)
                .patch(update_property)
                .delete(delete_property),
        )
        .route("/property/{id}/upload-image", post(upload_image))
        .route("/property/{id}/delete-image", delete(delete_image))
        .route("/property/{id}/bost", post(boost_property))
}
