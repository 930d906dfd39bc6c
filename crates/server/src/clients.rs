//! Client catalog: CRUD, active toggle, quote-composer search, and the
//! alternate recipient email list.

use axum::extract::{Path, State};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use quotedesk_core::domain::client::{Client, ClientDraft, ClientEmail};
use quotedesk_core::ServiceError;
use quotedesk_db::repositories::{ClientRepository, SqlClientRepository};

use crate::app::AppState;
use crate::error::ApiError;
use crate::guard::{authenticate, require_admin};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(create_client).get(list_clients))
        .route("/{id}", get(get_client).put(update_client))
        .route("/{id}", post(toggle_client_active).route_layer(from_fn(require_admin)))
        .route("/quote/{search}", get(search_for_quote))
        .route("/{id}/emails", post(add_email).get(list_emails))
        .route("/{id}/emails", delete(remove_email))
        .layer(from_fn_with_state(state.clone(), authenticate))
        .with_state(state)
}

fn validate_draft(draft: &ClientDraft) -> Result<(), ApiError> {
    let required = [
        ("fullname", &draft.fullname),
        ("id_number", &draft.id_number),
        ("contact", &draft.contact),
        ("email", &draft.email),
        ("address", &draft.address),
        ("department", &draft.department),
        ("city", &draft.city),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(ServiceError::validation(format!("{field} is required")).into());
        }
    }
    if !draft.email.contains('@') {
        return Err(ServiceError::validation("email is not a valid address").into());
    }
    Ok(())
}

async fn create_client(
    State(state): State<AppState>,
    Json(draft): Json<ClientDraft>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_draft(&draft)?;

    let repo = SqlClientRepository::new(state.db_pool.clone());
    if repo.id_number_or_email_taken(&draft.id_number, &draft.email, None).await? {
        return Err(ServiceError::conflict(
            "a client with that id number or email already exists",
        )
        .into());
    }

    let client_id = repo.create(&draft).await?;
    info!(event_name = "client.created", client_id, "client created");
    Ok(Json(json!({ "message": "client created", "client_id": client_id })))
}

async fn list_clients(State(state): State<AppState>) -> Result<Json<Vec<Client>>, ApiError> {
    Ok(Json(SqlClientRepository::new(state.db_pool.clone()).list().await?))
}

async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Client>, ApiError> {
    let client = SqlClientRepository::new(state.db_pool.clone())
        .find_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("client"))?;
    Ok(Json(client))
}

async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(draft): Json<ClientDraft>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_draft(&draft)?;

    let repo = SqlClientRepository::new(state.db_pool.clone());
    if repo.id_number_or_email_taken(&draft.id_number, &draft.email, Some(id)).await? {
        return Err(ServiceError::conflict(
            "another client already uses that id number or email",
        )
        .into());
    }

    if !repo.update(id, &draft).await? {
        return Err(ServiceError::not_found("client").into());
    }
    Ok(Json(json!({ "message": "client updated" })))
}

async fn toggle_client_active(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let is_active = SqlClientRepository::new(state.db_pool.clone())
        .toggle_active(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("client"))?;

    info!(event_name = "client.toggled", client_id = id, is_active, "client active flag flipped");
    Ok(Json(json!({
        "message": if is_active { "client activated" } else { "client deactivated" },
        "is_active": is_active,
    })))
}

async fn search_for_quote(
    State(state): State<AppState>,
    Path(search): Path<String>,
) -> Result<Json<Vec<Client>>, ApiError> {
    Ok(Json(SqlClientRepository::new(state.db_pool.clone()).search_active(&search).await?))
}

#[derive(Debug, Deserialize)]
struct EmailRequest {
    email: String,
}

async fn add_email(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let email = body.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ServiceError::validation("email is not a valid address").into());
    }

    let repo = SqlClientRepository::new(state.db_pool.clone());
    if repo.find_by_id(id).await?.is_none() {
        return Err(ServiceError::not_found("client").into());
    }
    if repo.email_taken(id, email).await? {
        return Err(ServiceError::conflict("that email is already on the list").into());
    }

    repo.add_email(id, email).await?;
    Ok(Json(json!({ "message": "email added" })))
}

async fn list_emails(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ClientEmail>>, ApiError> {
    let repo = SqlClientRepository::new(state.db_pool.clone());
    if repo.find_by_id(id).await?.is_none() {
        return Err(ServiceError::not_found("client").into());
    }
    Ok(Json(repo.list_emails(id).await?))
}

async fn remove_email(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = SqlClientRepository::new(state.db_pool.clone())
        .remove_email(id, body.email.trim())
        .await?;
    if !removed {
        return Err(ServiceError::not_found("email").into());
    }
    Ok(Json(json!({ "message": "email removed" })))
}
