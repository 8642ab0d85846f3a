//! User profile and user management routes.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    routing::get,
};

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::User;
use crate::models::user::{AGENT_SCHEMA, USER_SCHEMA, UpdateProfile, UserProfile};
use crate::query::{ListingRequest, Page, paginate};
use crate::routes::helpers::{ApiResponse, parse_id};
use crate::state::AppState;

/// GET /users/me
async fn me(State(state): State<AppState>, caller: AuthUser) -> AppResult<ApiResponse<User>> {
    let user = User::find_active(state.db(), caller.id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    Ok(ApiResponse::ok("Profile retrieved", user))
}

/// PATCH /users/me
async fn update_me(
    State(state): State<AppState>,
    caller: AuthUser,
    body: Result<Json<UpdateProfile>, JsonRejection>,
) -> AppResult<ApiResponse<User>> {
    let Json(body) = body?;

    let user = User::update_profile(state.db(), caller.id, body)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    Ok(ApiResponse::ok("Profile updated", user))
}

/// GET /users
async fn list_users(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<ApiResponse<Page<User>>> {
    caller.require_admin()?;

    let request = ListingRequest::from_params(&params, &USER_SCHEMA);
    let page = request.fetch(state.db(), &USER_SCHEMA).await?;

    Ok(ApiResponse::ok("Users retrieved", page))
}

/// GET /users/agents
///
/// Public directory of agents who are not blocked.
async fn list_agents(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<ApiResponse<Page<UserProfile>>> {
    let request = ListingRequest::from_params(&params, &AGENT_SCHEMA);
    let builder = request
        .builder(&AGENT_SCHEMA)?
        .where_equals("role", "agent")
        .where_equals("is_blocked", false);

    let page = paginate(state.db(), &builder, &request.page).await?;

    Ok(ApiResponse::ok("Agents retrieved", page))
}

/// GET /users/{id}
async fn get_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<User>> {
    caller.require_admin()?;
    let id = parse_id(&id, "user")?;

    let user = User::find_active(state.db(), id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    Ok(ApiResponse::ok("User retrieved", user))
}

/// DELETE /users/{id}
async fn delete_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    caller.require_admin()?;
    let id = parse_id(&id, "user")?;

    if id == caller.id {
        return Err(AppError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    if !User::soft_delete(state.db(), id).await? {
        return Err(AppError::not_found("User"));
    }

    tracing::info!(user_id = %id, deleted_by = %caller.id, "user deleted");

    Ok(ApiResponse::ok("User deleted", ()))
}

/// Create the users router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/me", get(me).patch(update_me))
        .route("/users/agents", get(list_agents))
        .route("/users/{id}", get(get_user).delete(delete_user))
}
