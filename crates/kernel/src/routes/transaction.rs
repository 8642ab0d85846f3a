//! Transaction routes.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    routing::get,
};
use serde::Deserialize;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::transaction::{NewTransaction, TRANSACTION_SCHEMA, UpdateTransaction};
use crate::models::{PaymentMethod, Plan, Transaction};
use crate::query::{ListingRequest, Page};
use crate::routes::helpers::{ApiResponse, parse_id};
use crate::state::AppState;

/// Payment submitted for a plan, pending admin review.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub subscription_id: String,
    #[serde(rename = "type")]
    pub method: PaymentMethod,
    pub screenshot: Option<String>,
    /// External payment reference.
    pub transaction_id: Option<String>,
}

/// Record a pending transaction for `caller` against a plan.
///
/// Amount and duration are taken from the plan, never from the request.
pub async fn record_payment(
    state: &AppState,
    caller: &AuthUser,
    request: PaymentRequest,
) -> AppResult<Transaction> {
    let plan_id = parse_id(&request.subscription_id, "subscription")?;
    let plan = Plan::find_by_id(state.db(), plan_id)
        .await?
        .ok_or_else(|| AppError::not_found("Subscription plan"))?;

    let transaction = Transaction::create(
        state.db(),
        NewTransaction {
            user_id: caller.id,
            plan_id: plan.id,
            amount: plan.amount,
            subscription_limitation: plan.days,
            method: request.method,
            screenshot: request.screenshot,
            reference: request
                .transaction_id
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        },
    )
    .await?;

    info!(
        transaction_id = %transaction.id,
        user_id = %caller.id,
        plan_id = %plan.id,
        "payment recorded"
    );

    Ok(transaction)
}

/// GET /transactions
async fn list_transactions(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<ApiResponse<Page<Transaction>>> {
    caller.require_admin()?;

    let request = ListingRequest::from_params(&params, &TRANSACTION_SCHEMA);
    let page = request.fetch(state.db(), &TRANSACTION_SCHEMA).await?;

    Ok(ApiResponse::ok("Transactions retrieved", page))
}

/// POST /transactions
async fn create_transaction(
    State(state): State<AppState>,
    caller: AuthUser,
    body: Result<Json<PaymentRequest>, JsonRejection>,
) -> AppResult<ApiResponse<Transaction>> {
    let Json(body) = body?;
    let transaction = record_payment(&state, &caller, body).await?;

    Ok(ApiResponse::created("Transaction created", transaction))
}

/// GET /transactions/{id}
async fn get_transaction(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Transaction>> {
    caller.require_admin()?;
    let id = parse_id(&id, "transaction")?;

    let transaction = Transaction::find_by_id(state.db(), id)
        .await?
        .ok_or_else(|| AppError::not_found("Transaction"))?;

    Ok(ApiResponse::ok("Transaction retrieved", transaction))
}

/// PATCH /transactions/{id}
///
/// Status changes go through subscription approval, not here.
async fn update_transaction(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    body: Result<Json<UpdateTransaction>, JsonRejection>,
) -> AppResult<ApiResponse<Transaction>> {
    caller.require_admin()?;
    let id = parse_id(&id, "transaction")?;
    let Json(body) = body?;

    if body.amount.is_some_and(|a| a < 0.0) {
        return Err(AppError::BadRequest("amount must not be negative".to_string()));
    }

    let transaction = Transaction::update(state.db(), id, body)
        .await?
        .ok_or_else(|| AppError::not_found("Transaction"))?;

    Ok(ApiResponse::ok("Transaction updated", transaction))
}

/// DELETE /transactions/{id}
async fn delete_transaction(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    caller.require_admin()?;
    let id = parse_id(&id, "transaction")?;

    if !Transaction::soft_delete(state.db(), id).await? {
        return Err(AppError::not_found("Transaction"));
    }

    Ok(ApiResponse::ok("Transaction deleted", ()))
}

/// Create the transactions router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/transactions",
            get(list_transactions).post(create_transaction),
        )
        .route(
            "/transactions/{id}",
            get(get_transaction)
                .patch(update_transaction)
                .delete(delete_transaction),
        )
}
