//! Payment gateway routes.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    routing::get,
};

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::PaymentGateway;
use crate::models::payment_gateway::{CreateGateway, GATEWAY_SCHEMA, UpdateGateway};
use crate::query::{ListingRequest, Page};
use crate::routes::helpers::{ApiResponse, parse_id, require_text};
use crate::state::AppState;

/// GET /payment-gateways
async fn list_gateways(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<ApiResponse<Page<PaymentGateway>>> {
    let request = ListingRequest::from_params(&params, &GATEWAY_SCHEMA);
    let page = request.fetch(state.db(), &GATEWAY_SCHEMA).await?;

    Ok(ApiResponse::ok("Payment gateways retrieved", page))
}

/// POST /payment-gateways
async fn create_gateway(
    State(state): State<AppState>,
    caller: AuthUser,
    body: Result<Json<CreateGateway>, JsonRejection>,
) -> AppResult<ApiResponse<PaymentGateway>> {
    caller.require_admin()?;
    let Json(body) = body?;
    require_text(&body.name, "name")?;

    let gateway = PaymentGateway::create(state.db(), caller.id, body).await?;

    Ok(ApiResponse::created("Payment gateway created", gateway))
}

/// GET /payment-gateways/{id}
async fn get_gateway(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PaymentGateway>> {
    caller.require_admin()?;
    let id = parse_id(&id, "payment gateway")?;

    let gateway = PaymentGateway::find_by_id(state.db(), id)
        .await?
        .ok_or_else(|| AppError::not_found("Payment gateway"))?;

    Ok(ApiResponse::ok("Payment gateway retrieved", gateway))
}

/// PATCH /payment-gateways/{id}
async fn update_gateway(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    body: Result<Json<UpdateGateway>, JsonRejection>,
) -> AppResult<ApiResponse<PaymentGateway>> {
    caller.require_admin()?;
    let id = parse_id(&id, "payment gateway")?;
    let Json(body) = body?;

    let gateway = PaymentGateway::update(state.db(), id, body)
        .await?
        .ok_or_else(|| AppError::not_found("Payment gateway"))?;

    Ok(ApiResponse::ok("Payment gateway updated", gateway))
}

/// DELETE /payment-gateways/{id}
async fn delete_gateway(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    caller.require_admin()?;
    let id = parse_id(&id, "payment gateway")?;

    if !PaymentGateway::soft_delete(state.db(), id).await? {
        return Err(AppError::not_found("Payment gateway"));
    }

    Ok(ApiResponse::ok("Payment gateway deleted", ()))
}

/// Create the payment gateway router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/payment-gateways",
            get(list_gateways).post(create_gateway),
        )
        .route(
            "/payment-gateways/{id}",
            get(get_gateway)
                .patch(update_gateway)
                .delete(delete_gateway),
        )
}
