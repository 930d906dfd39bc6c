//! Request gates: `authenticate` resolves a bearer token to an immutable
//! per-request identity; `require_admin` additionally demands the elevated
//! flag. They compose as ordered layers, so an unauthenticated request never
//! reaches the admin check.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::Response;
use quotedesk_core::{auth, ServiceError};
use quotedesk_db::repositories::{SqlUserRepository, UserRepository};
use serde::Serialize;

use crate::app::AppState;
use crate::error::ApiError;

/// Identity resolved once per request and handed to handlers read-only.
/// There is no server-side logout state to mutate; discarding the token is
/// the client's half of the contract.
#[derive(Clone, Debug, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
}

pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| unauthorized("missing authorization header"))?;

    let token = auth::bearer_token(header_value)
        .ok_or_else(|| unauthorized("authorization header is not a bearer token"))?;

    let claims =
        auth::verify_token(&state.config.auth.jwt_secret, token).map_err(|error| match error {
            auth::AuthError::TokenExpired => unauthorized("token expired"),
            other => unauthorized(other.to_string()),
        })?;
    let user_id = claims.user_id().map_err(|error| unauthorized(error.to_string()))?;

    let user = SqlUserRepository::new(state.db_pool.clone())
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| unauthorized(format!("token subject {user_id} has no account")))?;
    if !user.is_active {
        return Err(unauthorized(format!("account {user_id} is inactive")));
    }

    request.extensions_mut().insert(CurrentUser {
        id: user.id,
        username: user.username,
        email: user.email,
        is_admin: user.is_admin,
    });

    Ok(next.run(request).await)
}

pub async fn require_admin(request: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| unauthorized("request reached the admin gate unauthenticated"))?;

    if !user.is_admin {
        return Err(ApiError(ServiceError::Forbidden(format!(
            "user {} lacks the admin capability",
            user.id
        ))));
    }

    Ok(next.run(request).await)
}

fn unauthorized(detail: impl Into<String>) -> ApiError {
    ApiError(ServiceError::Unauthorized(detail.into()))
}
