//! Reusable mail attachments. The file payload travels as the raw request
//! body with metadata in query parameters; a row is only written once its
//! file is on disk, and deleting a row also deletes the file.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use quotedesk_core::domain::attachment::{Attachment, AttachmentKind};
use quotedesk_core::ServiceError;
use quotedesk_db::repositories::{AttachmentRepository, SqlAttachmentRepository};

use crate::app::AppState;
use crate::error::ApiError;
use crate::guard::{authenticate, require_admin};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(create_attachment).get(list_attachments))
        .route("/{id}", get(get_attachment).put(update_attachment))
        .route("/{id}", post(toggle_attachment_active).route_layer(from_fn(require_admin)))
        .route("/{id}", delete(delete_attachment).route_layer(from_fn(require_admin)))
        .layer(from_fn_with_state(state.clone(), authenticate))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct AttachmentParams {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    attachment_type: Option<i64>,
    #[serde(default)]
    file_name: Option<String>,
}

struct ValidatedParams {
    name: String,
    kind: AttachmentKind,
}

fn validate_params(params: &AttachmentParams) -> Result<ValidatedParams, ApiError> {
    let name = params
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ServiceError::validation("attachment name is required"))?;
    let kind = params
        .attachment_type
        .ok_or_else(|| ServiceError::validation("attachment type is required"))
        .and_then(AttachmentKind::parse)?;
    Ok(ValidatedParams { name: name.to_string(), kind })
}

async fn create_attachment(
    State(state): State<AppState>,
    Query(params): Query<AttachmentParams>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let validated = validate_params(&params)?;
    let file_name = params
        .file_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ServiceError::validation("file_name is required"))?;
    if body.is_empty() {
        return Err(ServiceError::validation("a file payload is required").into());
    }

    let url = state
        .files
        .write(file_name, &body)
        .await
        .map_err(|error| ServiceError::internal(error.to_string()))?;

    let repo = SqlAttachmentRepository::new(state.db_pool.clone());
    let attachment_id = match repo.create(&validated.name, validated.kind, &url).await {
        Ok(id) => id,
        Err(error) => {
            // The row never existed, so the file must not linger either.
            if let Err(cleanup) = state.files.delete(&url).await {
                warn!(
                    event_name = "attachment.cleanup_failed",
                    url = %url,
                    error = %cleanup,
                    "stored file could not be removed after a failed insert"
                );
            }
            return Err(error.into());
        }
    };

    info!(event_name = "attachment.created", attachment_id, "attachment created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "attachment created", "attachment_id": attachment_id })),
    ))
}

#[derive(Debug, Deserialize)]
struct ListAttachmentsQuery {
    #[serde(default)]
    is_active: Option<String>,
    #[serde(default)]
    search: Option<String>,
}

async fn list_attachments(
    State(state): State<AppState>,
    Query(query): Query<ListAttachmentsQuery>,
) -> Result<Json<Vec<Attachment>>, ApiError> {
    // Active rows unless explicitly asked for the inactive set.
    let is_active = query.is_active.as_deref() != Some("0");
    let rows = SqlAttachmentRepository::new(state.db_pool.clone())
        .list(is_active, query.search.as_deref())
        .await?;
    Ok(Json(rows))
}

async fn get_attachment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Attachment>, ApiError> {
    let attachment = SqlAttachmentRepository::new(state.db_pool.clone())
        .find_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("attachment"))?;
    Ok(Json(attachment))
}

async fn update_attachment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<AttachmentParams>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let validated = validate_params(&params)?;

    let repo = SqlAttachmentRepository::new(state.db_pool.clone());
    let existing = repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("attachment"))?;

    // An empty body keeps the current file; a payload replaces it and the
    // previous file is deleted once the row points at the new one.
    let url = if body.is_empty() {
        existing.url.clone()
    } else {
        let file_name = params
            .file_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ServiceError::validation("file_name is required with a file payload"))?;
        state
            .files
            .write(file_name, &body)
            .await
            .map_err(|error| ServiceError::internal(error.to_string()))?
    };

    if !repo.update(id, &validated.name, validated.kind, &url).await? {
        return Err(ServiceError::not_found("attachment").into());
    }

    if url != existing.url {
        if let Err(error) = state.files.delete(&existing.url).await {
            warn!(
                event_name = "attachment.stale_file",
                attachment_id = id,
                url = %existing.url,
                error = %error,
                "previous attachment file could not be removed"
            );
        }
    }

    info!(event_name = "attachment.updated", attachment_id = id, "attachment updated");
    Ok(Json(json!({ "message": "attachment updated" })))
}

async fn toggle_attachment_active(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let is_active = SqlAttachmentRepository::new(state.db_pool.clone())
        .toggle_active(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("attachment"))?;

    Ok(Json(json!({
        "message": if is_active { "attachment activated" } else { "attachment deactivated" },
        "is_active": is_active,
    })))
}

async fn delete_attachment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let repo = SqlAttachmentRepository::new(state.db_pool.clone());
    let attachment = repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("attachment"))?;

    if let Err(error) = state.files.delete(&attachment.url).await {
        warn!(
            event_name = "attachment.file_delete_failed",
            attachment_id = id,
            error = %error,
            "attachment file could not be removed, deleting the row anyway"
        );
    }
    repo.delete(id).await?;

    info!(event_name = "attachment.deleted", attachment_id = id, "attachment deleted");
    Ok(Json(json!({ "message": "attachment deleted" })))
}
