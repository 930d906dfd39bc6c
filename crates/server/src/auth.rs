//! Account endpoints: login, account management, identity echo.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use quotedesk_core::{auth, ServiceError, User};
use quotedesk_db::repositories::{SqlUserRepository, UserRepository};

use crate::app::AppState;
use crate::error::ApiError;
use crate::guard::{authenticate, require_admin, CurrentUser};

pub fn router(state: AppState) -> Router {
    let open = Router::new().route("/login", post(login)).with_state(state.clone());

    let authed = Router::new()
        .route("/user", get(current_user))
        .route("/logout", post(logout))
        .route("/update-password", post(update_password))
        .route("/create-account", post(create_account).route_layer(from_fn(require_admin)))
        .route("/users", get(list_users).route_layer(from_fn(require_admin)))
        .route("/user/{id}", post(toggle_user_active).route_layer(from_fn(require_admin)))
        .layer(from_fn_with_state(state.clone(), authenticate))
        .with_state(state);

    open.merge(authed)
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(ServiceError::validation("email and password are required").into());
    }

    let user = SqlUserRepository::new(state.db_pool.clone())
        .find_by_email(body.email.trim())
        .await?
        .ok_or_else(|| ServiceError::Unauthorized(format!("unknown email {}", body.email)))?;

    if !user.is_active {
        return Err(ServiceError::Unauthorized(format!("account {} is inactive", user.id)).into());
    }

    let valid = auth::verify_password(&body.password, &user.password_hash)
        .map_err(|error| ServiceError::internal(error.to_string()))?;
    if !valid {
        return Err(ServiceError::Unauthorized(format!("bad password for user {}", user.id)).into());
    }

    let token = auth::sign_token(
        &state.config.auth.jwt_secret,
        user.id,
        state.config.auth.token_ttl_hours,
    )
    .map_err(|error| ServiceError::internal(error.to_string()))?;

    info!(event_name = "auth.login", user_id = user.id, "user logged in");
    Ok(Json(LoginResponse { token }))
}

#[derive(Debug, Deserialize)]
struct CreateAccountRequest {
    username: String,
    email: String,
    password: String,
    #[serde(default)]
    is_admin: bool,
}

async fn create_account(
    State(state): State<AppState>,
    Json(body): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.username.trim().is_empty() || body.email.trim().is_empty() || body.password.is_empty()
    {
        return Err(ServiceError::validation("username, email and password are required").into());
    }

    let repo = SqlUserRepository::new(state.db_pool.clone());
    if repo.find_by_email(body.email.trim()).await?.is_some() {
        return Err(ServiceError::conflict("that email is already registered").into());
    }

    let password_hash = auth::hash_password(&body.password)
        .map_err(|error| ServiceError::internal(error.to_string()))?;
    let user_id =
        repo.create(body.username.trim(), body.email.trim(), &password_hash, body.is_admin).await?;

    info!(event_name = "auth.account_created", user_id, "account created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "account created",
            "user": { "id": user_id, "username": body.username.trim(), "email": body.email.trim() },
        })),
    ))
}

async fn current_user(Extension(user): Extension<CurrentUser>) -> Json<CurrentUser> {
    Json(user)
}

/// Identity is immutable per request; the server holds no session state to
/// clear. The client discards its token.
async fn logout(Extension(user): Extension<CurrentUser>) -> Json<serde_json::Value> {
    info!(event_name = "auth.logout", user_id = user.id, "logout acknowledged");
    Json(json!({ "message": "logged out" }))
}

#[derive(Debug, Deserialize)]
struct UpdatePasswordRequest {
    new_password: String,
}

async fn update_password(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<UpdatePasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.new_password.is_empty() {
        return Err(ServiceError::validation("new password is required").into());
    }

    let password_hash = auth::hash_password(&body.new_password)
        .map_err(|error| ServiceError::internal(error.to_string()))?;
    let updated =
        SqlUserRepository::new(state.db_pool.clone()).update_password(user.id, &password_hash).await?;
    if !updated {
        return Err(ServiceError::not_found("user").into());
    }

    info!(event_name = "auth.password_updated", user_id = user.id, "password updated");
    Ok(Json(json!({ "message": "password updated" })))
}

#[derive(Debug, Serialize)]
struct UserSummary {
    id: i64,
    username: String,
    email: String,
    is_admin: bool,
    is_active: bool,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_admin: user.is_admin,
            is_active: user.is_active,
        }
    }
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let users = SqlUserRepository::new(state.db_pool.clone()).list().await?;
    Ok(Json(users.into_iter().map(UserSummary::from).collect()))
}

async fn toggle_user_active(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let is_active = SqlUserRepository::new(state.db_pool.clone())
        .toggle_active(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("user"))?;

    info!(event_name = "auth.user_toggled", user_id = id, is_active, "user active flag flipped");
    Ok(Json(json!({
        "message": if is_active { "user activated" } else { "user deactivated" },
        "is_active": is_active,
    })))
}
