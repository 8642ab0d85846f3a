//! Bearer token authentication middleware.
//!
//! Checks `Authorization: Bearer <token>` headers, verifies the JWT and sets
//! the caller in request extensions.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{FromRequestParts, OptionalFromRequestParts, State},
    http::{Request, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Role;
use crate::state::AppState;

/// Middleware to authenticate Bearer JWT tokens.
///
/// If a valid Bearer token is present, sets [`AuthUser`] in request
/// extensions. If no token is present, passes through without modification.
/// If an invalid token is present, returns 401.
pub async fn authenticate_bearer_token(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(auth_header) = auth_header else {
        return next.run(request).await;
    };

    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return next.run(request).await;
    };

    let claims = match state.tokens().verify(token.trim()) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "invalid bearer token");
            return AppError::Unauthorized.into_response();
        }
    };

    let Ok(id) = claims.sub.parse::<Uuid>() else {
        debug!(sub = %claims.sub, "invalid user ID in token");
        return AppError::Unauthorized.into_response();
    };

    request.extensions_mut().insert(AuthUser {
        id,
        role: claims.role,
    });

    next.run(request).await
}

/// Authenticated caller extracted from a valid JWT.
///
/// Extracting `AuthUser` rejects anonymous requests with 401;
/// `Option<AuthUser>` accepts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    /// Forbidden unless the caller is an admin.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin access required".to_string()))
        }
    }

    /// Forbidden unless the caller is an agent or an admin.
    pub fn require_agent_or_admin(&self) -> Result<(), AppError> {
        if self.role.is_agent_or_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Agent or admin access required".to_string(),
            ))
        }
    }

    /// Forbidden unless the caller owns the resource or is an admin.
    pub fn require_owner_or_admin(&self, owner: Uuid) -> Result<(), AppError> {
        if self.id == owner || self.role.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You do not have permission to modify this resource".to_string(),
            ))
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or(AppError::Unauthorized)
    }
}

impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthUser>().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role) -> AuthUser {
        AuthUser {
            id: Uuid::now_v7(),
            role,
        }
    }

    #[test]
    fn role_guards() {
        assert!(caller(Role::Admin).require_admin().is_ok());
        assert!(matches!(
            caller(Role::Agent).require_admin(),
            Err(AppError::Forbidden(_))
        ));
        assert!(caller(Role::Agent).require_agent_or_admin().is_ok());
        assert!(caller(Role::User).require_agent_or_admin().is_err());
    }

    #[test]
    fn owner_or_admin() {
        let user = caller(Role::User);
        assert!(user.require_owner_or_admin(user.id).is_ok());
        assert!(user.require_owner_or_admin(Uuid::now_v7()).is_err());
        assert!(caller(Role::Admin).require_owner_or_admin(Uuid::now_v7()).is_ok());
    }
}
