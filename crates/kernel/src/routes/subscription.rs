//! Subscription plan routes and the take/approve/reject flow.
//!
//! Taking a plan records a pending transaction. An admin then approves it,
//! which activates the plan on the user, or rejects it.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    routing::{get, post},
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::plan::{CreatePlan, PLAN_SCHEMA, UpdatePlan};
use crate::models::{Plan, Transaction, TransactionStatus, User};
use crate::query::{ListingRequest, Page};
use crate::routes::helpers::{ApiResponse, parse_id, require_text};
use crate::routes::transaction::{PaymentRequest, record_payment};
use crate::state::AppState;

/// Identifies the pending transaction an admin is reviewing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub transaction_id: String,
}

#[derive(Debug, Serialize)]
pub struct Approval {
    pub transaction: Transaction,
    pub user: User,
}

fn validate_plan_numbers(amount: Option<f64>, credits: &[Option<i32>]) -> Result<(), AppError> {
    if amount.is_some_and(|a| a < 0.0) {
        return Err(AppError::BadRequest("amount must not be negative".to_string()));
    }
    if credits.iter().flatten().any(|c| *c < 0) {
        return Err(AppError::BadRequest("credits must not be negative".to_string()));
    }
    Ok(())
}

/// Explain why a pending-only transition matched nothing.
async fn settle_failure(state: &AppState, id: Uuid) -> AppError {
    match Transaction::find_by_id(state.db(), id).await {
        Ok(Some(t)) => AppError::BadRequest(format!("Transaction is already {}", t.status)),
        Ok(None) => AppError::not_found("Transaction"),
        Err(e) => AppError::Internal(e),
    }
}

/// GET /subscriptions
async fn list_plans(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<ApiResponse<Page<Plan>>> {
    let request = ListingRequest::from_params(&params, &PLAN_SCHEMA);
    let page = request.fetch(state.db(), &PLAN_SCHEMA).await?;

    Ok(ApiResponse::ok("Subscriptions retrieved", page))
}

/// POST /subscriptions
async fn create_plan(
    State(state): State<AppState>,
    caller: AuthUser,
    body: Result<Json<CreatePlan>, JsonRejection>,
) -> AppResult<ApiResponse<Plan>> {
    caller.require_admin()?;
    let Json(body) = body?;

    require_text(&body.title, "title")?;
    validate_plan_numbers(
        Some(body.amount),
        &[
            Some(body.property_image_credit),
            Some(body.property_video_credit),
            Some(body.boost_credit),
        ],
    )?;

    let plan = Plan::create(state.db(), caller.id, body).await?;
    info!(plan_id = %plan.id, "subscription plan created");

    Ok(ApiResponse::created("Subscription created", plan))
}

/// GET /subscriptions/{id}
async fn get_plan(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Plan>> {
    caller.require_admin()?;
    let id = parse_id(&id, "subscription")?;

    let plan = Plan::find_by_id(state.db(), id)
        .await?
        .ok_or_else(|| AppError::not_found("Subscription"))?;

    Ok(ApiResponse::ok("Subscription retrieved", plan))
}

/// PATCH /subscriptions/{id}
async fn update_plan(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    body: Result<Json<UpdatePlan>, JsonRejection>,
) -> AppResult<ApiResponse<Plan>> {
    caller.require_admin()?;
    let id = parse_id(&id, "subscription")?;
    let Json(body) = body?;

    validate_plan_numbers(
        body.amount,
        &[
            body.property_image_credit,
            body.property_video_credit,
            body.boost_credit,
        ],
    )?;

    let plan = Plan::update(state.db(), id, body)
        .await?
        .ok_or_else(|| AppError::not_found("Subscription"))?;

    Ok(ApiResponse::ok("Subscription updated", plan))
}

/// DELETE /subscriptions/{id}
async fn delete_plan(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    caller.require_admin()?;
    let id = parse_id(&id, "subscription")?;

    if !Plan::soft_delete(state.db(), id).await? {
        return Err(AppError::not_found("Subscription"));
    }

    Ok(ApiResponse::ok("Subscription deleted", ()))
}

/// POST /subscriptions/take
async fn take_plan(
    State(state): State<AppState>,
    caller: AuthUser,
    body: Result<Json<PaymentRequest>, JsonRejection>,
) -> AppResult<ApiResponse<Transaction>> {
    let Json(body) = body?;
    let transaction = record_payment(&state, &caller, body).await?;

    Ok(ApiResponse::created(
        "Thank you for choosing our subscription plan. Please wait for admin review.",
        transaction,
    ))
}

/// POST /subscriptions/approve
///
/// Completes the transaction and activates the plan on its user in one
/// database transaction. The subscription runs from now for the plan's days.
async fn approve(
    State(state): State<AppState>,
    caller: AuthUser,
    body: Result<Json<ReviewRequest>, JsonRejection>,
) -> AppResult<ApiResponse<Approval>> {
    caller.require_admin()?;
    let Json(body) = body?;
    let id = parse_id(&body.transaction_id, "transaction")?;

    let mut tx = state.db().begin().await?;

    let Some(transaction) =
        Transaction::settle(&mut tx, id, TransactionStatus::Completed).await?
    else {
        drop(tx);
        return Err(settle_failure(&state, id).await);
    };

    let plan = Plan::find_in(&mut tx, transaction.plan_id)
        .await?
        .ok_or_else(|| AppError::not_found("Subscription plan"))?;

    let expires_at = Utc::now() + Duration::days(i64::from(plan.days));
    let user = User::activate_subscription(
        &mut tx,
        transaction.user_id,
        plan.id,
        transaction.id,
        expires_at,
        plan.boost_credit,
    )
    .await?
    .ok_or_else(|| AppError::not_found("User"))?;

    tx.commit().await?;

    info!(
        transaction_id = %transaction.id,
        user_id = %user.id,
        plan_id = %plan.id,
        expires_at = %expires_at,
        approved_by = %caller.id,
        "subscription approved"
    );

    Ok(ApiResponse::ok(
        "Subscription approved",
        Approval { transaction, user },
    ))
}

/// POST /subscriptions/reject
async fn reject(
    State(state): State<AppState>,
    caller: AuthUser,
    body: Result<Json<ReviewRequest>, JsonRejection>,
) -> AppResult<ApiResponse<Transaction>> {
    caller.require_admin()?;
    let Json(body) = body?;
    let id = parse_id(&body.transaction_id, "transaction")?;

    let mut conn = state.db().acquire().await?;
    let Some(transaction) =
        Transaction::settle(&mut conn, id, TransactionStatus::Canceled).await?
    else {
        drop(conn);
        return Err(settle_failure(&state, id).await);
    };

    info!(transaction_id = %transaction.id, rejected_by = %caller.id, "subscription rejected");

    Ok(ApiResponse::ok("Subscription rejected", transaction))
}

/// Create the subscriptions router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subscriptions", get(list_plans).post(create_plan))
        .route("/subscriptions/take", post(take_plan))
        .route("/subscriptions/approve", post(approve))
        .route("/subscriptions/reject", post(reject))
        .route(
            "/subscriptions/{id}",
            get(get_plan).patch(update_plan).delete(delete_plan),
        )
}
