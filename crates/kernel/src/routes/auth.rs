//! Registration and login.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::user::CreateUser;
use crate::models::{Role, User};
use crate::routes::helpers::{ApiResponse, require_text};
use crate::services::token::IssuedToken;
use crate::state::AppState;

/// Minimum password length.
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

fn default_role() -> Role {
    Role::User
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub user: User,
    pub tokens: IssuedToken,
}

/// Passwords need a letter and a digit and at least eight characters.
fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err(AppError::BadRequest(
            "Password must contain at least one letter and one number".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    let email = email.trim();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
        && !email.contains(char::is_whitespace);
    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest("Invalid email address".to_string()))
    }
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|e| e.is_unique_violation())
}

/// POST /auth/register
///
/// Public sign-up creates `user` or `agent` accounts; only an admin may
/// create another admin.
async fn register(
    State(state): State<AppState>,
    caller: Option<AuthUser>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<ApiResponse<AuthPayload>> {
    let Json(body) = body?;

    require_text(&body.first_name, "firstName")?;
    validate_email(&body.email)?;
    validate_password(&body.password)?;

    if body.role.is_admin() && !caller.is_some_and(|c| c.role.is_admin()) {
        return Err(AppError::Forbidden(
            "Only an admin can create admin accounts".to_string(),
        ));
    }

    if User::find_by_email(state.db(), &body.email).await?.is_some() {
        return Err(AppError::Conflict("Email already taken".to_string()));
    }

    let user = User::create(
        state.db(),
        CreateUser {
            first_name: body.first_name,
            last_name: body.last_name,
            email: body.email,
            password: body.password,
            role: body.role,
            phone_number: body.phone_number,
            address: body.address,
        },
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Email already taken".to_string())
        } else {
            AppError::Internal(e)
        }
    })?;

    let tokens = state.tokens().issue(&user)?;
    info!(user_id = %user.id, role = %user.role, "user registered");

    Ok(ApiResponse::created(
        "Account created",
        AuthPayload { user, tokens },
    ))
}

/// POST /auth/login
async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<ApiResponse<AuthPayload>> {
    let Json(body) = body?;

    let invalid = || AppError::BadRequest("Incorrect email or password".to_string());

    let user = User::find_by_email(state.db(), &body.email)
        .await?
        .filter(|u| !u.is_deleted)
        .ok_or_else(invalid)?;

    if !user.verify_password(&body.password) {
        return Err(invalid());
    }

    if user.is_blocked {
        return Err(AppError::Forbidden("Your account has been blocked".to_string()));
    }

    let tokens = state.tokens().issue(&user)?;
    info!(user_id = %user.id, "user logged in");

    Ok(ApiResponse::ok("Login successful", AuthPayload { user, tokens }))
}

/// Create the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_rules() {
        assert!(validate_password("short1").is_err());
        assert!(validate_password("lettersonly").is_err());
        assert!(validate_password("12345678").is_err());
        assert!(validate_password("1qazxsw2").is_ok());
    }

    #[test]
    fn email_shape() {
        assert!(validate_email("agent@example.com").is_ok());
        assert!(validate_email("agent@localhost").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("a b@example.com").is_err());
    }

    #[test]
    fn register_defaults_to_user_role() {
        let body: RegisterRequest = serde_json::from_str(
            r#"{"firstName":"Ayesha","email":"a@example.com","password":"1qazxsw2"}"#,
        )
        .unwrap();
        assert_eq!(body.role, Role::User);
        assert_eq!(body.last_name, "");
    }
}
