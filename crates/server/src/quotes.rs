//! Quote aggregate endpoints: transactional create/update/delete with line
//! items, status changes, filtered listing, detail, PDF download, email
//! dispatch, and the single-line-item utilities.

use axum::extract::{Path, Query, State};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use quotedesk_core::domain::attachment::AttachmentKind;
use quotedesk_core::domain::quote::{computed_total, QuoteDetail, QuoteItemInput, QuoteStatus};
use quotedesk_core::ServiceError;
use quotedesk_db::repositories::{
    ClientRepository, QuoteListFilter, QuoteListRow, QuoteRepository, SqlClientRepository,
    SqlQuoteRepository,
};

use crate::app::AppState;
use crate::error::{tx_failure, ApiError};
use crate::guard::{authenticate, require_admin, CurrentUser};
use crate::mailer::{dispatch_quote_email, SendOutcome};
use crate::pdf::{pdf_response, render_quote_pdf};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(create_quote).get(list_quotes))
        .route("/{id}", get(get_quote).put(update_quote))
        .route("/{id}", delete(delete_quote).route_layer(from_fn(require_admin)))
        .route("/update-status/{id}", post(update_status))
        .route("/generate-pdf/{id}", get(generate_pdf))
        .route("/send-quote-email", post(send_quote_email))
        .route("/item/{id}", put(update_item))
        .route("/item/{id}", delete(delete_item).route_layer(from_fn(require_admin)))
        .layer(from_fn_with_state(state.clone(), authenticate))
        .with_state(state)
}

fn validate_line(price: f64, quantity: i64, tax: i64) -> Result<(), ApiError> {
    if quantity <= 0 {
        return Err(ServiceError::validation("line item quantity must be positive").into());
    }
    if !price.is_finite() || price < 0.0 {
        return Err(ServiceError::validation("line item price must be a non-negative number").into());
    }
    if !(0..=100).contains(&tax) {
        return Err(
            ServiceError::validation("line item tax must be a percentage between 0 and 100").into()
        );
    }
    Ok(())
}

fn validate_items(items: &[QuoteItemInput]) -> Result<(), ApiError> {
    if items.is_empty() {
        return Err(ServiceError::validation("a quote needs at least one line item").into());
    }
    for item in items {
        validate_line(item.price, item.quantity, item.tax)?;
    }
    Ok(())
}

/// The stored total is always the computed sum; a diverging caller-supplied
/// total is advisory and only worth a warning.
fn resolve_total(quote_id: Option<i64>, items: &[QuoteItemInput], submitted: Option<f64>) -> f64 {
    let computed = computed_total(items);
    if let Some(submitted) = submitted {
        if (submitted - computed).abs() > 0.005 {
            warn!(
                event_name = "quote.total.divergence",
                quote_id = quote_id.unwrap_or_default(),
                submitted,
                computed,
                "caller-supplied total disagrees with line items, storing the computed value"
            );
        }
    }
    computed
}

async fn ensure_client_exists(state: &AppState, client_id: i64) -> Result<(), ApiError> {
    SqlClientRepository::new(state.db_pool.clone())
        .find_by_id(client_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("client"))?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct CreateQuoteRequest {
    client_id: i64,
    #[serde(default)]
    notes: Option<String>,
    items: Vec<QuoteItemInput>,
    #[serde(default)]
    total: Option<f64>,
}

async fn create_quote(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateQuoteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_items(&body.items)?;
    ensure_client_exists(&state, body.client_id).await?;

    let total = resolve_total(None, &body.items, body.total);
    let quote_id = SqlQuoteRepository::new(state.db_pool.clone())
        .create_with_items(
            body.client_id,
            body.notes.as_deref(),
            &body.items,
            total,
            &user.username,
        )
        .await
        .map_err(tx_failure)?;

    info!(event_name = "quote.created", quote_id, client_id = body.client_id, "quote created");
    Ok(Json(json!({ "message": "quote created", "quote_id": quote_id })))
}

#[derive(Debug, Deserialize)]
struct ListQuotesQuery {
    #[serde(default, alias = "showState")]
    show_state: Option<String>,
    #[serde(default)]
    search: Option<String>,
}

async fn list_quotes(
    State(state): State<AppState>,
    Query(query): Query<ListQuotesQuery>,
) -> Result<Json<Vec<QuoteListRow>>, ApiError> {
    // "All" (or nothing) bypasses the status filter.
    let status = match query.show_state.as_deref().map(str::trim) {
        None | Some("") | Some("All") => None,
        Some(raw) => Some(QuoteStatus::parse(raw)?),
    };

    let rows = SqlQuoteRepository::new(state.db_pool.clone())
        .list(&QuoteListFilter { status, search: query.search })
        .await?;
    Ok(Json(rows))
}

async fn get_quote(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<QuoteDetail>, ApiError> {
    let detail = SqlQuoteRepository::new(state.db_pool.clone())
        .detail(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("quote"))?;
    Ok(Json(detail))
}

#[derive(Debug, Deserialize)]
struct UpdateQuoteRequest {
    client_id: i64,
    #[serde(default)]
    notes: Option<String>,
    items: Vec<QuoteItemInput>,
    #[serde(default)]
    total: Option<f64>,
    status: String,
}

async fn update_quote(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateQuoteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_items(&body.items)?;
    let status = QuoteStatus::parse(&body.status)?;
    ensure_client_exists(&state, body.client_id).await?;

    let total = resolve_total(Some(id), &body.items, body.total);
    let updated = SqlQuoteRepository::new(state.db_pool.clone())
        .update_with_items(id, body.client_id, body.notes.as_deref(), status, &body.items, total)
        .await
        .map_err(tx_failure)?;
    if !updated {
        return Err(ServiceError::not_found("quote").into());
    }

    info!(event_name = "quote.updated", quote_id = id, "quote updated");
    Ok(Json(json!({ "message": "quote updated", "quote_id": id })))
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: String,
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = QuoteStatus::parse(&body.status)?;
    let updated = SqlQuoteRepository::new(state.db_pool.clone()).set_status(id, status).await?;
    if !updated {
        return Err(ServiceError::not_found("quote").into());
    }

    info!(event_name = "quote.status_changed", quote_id = id, status = %status, "status changed");
    Ok(Json(json!({ "message": format!("quote updated to {status}") })))
}

async fn delete_quote(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = SqlQuoteRepository::new(state.db_pool.clone())
        .delete_with_items(id)
        .await
        .map_err(tx_failure)?;
    if !deleted {
        return Err(ServiceError::not_found("quote").into());
    }

    info!(event_name = "quote.deleted", quote_id = id, "quote deleted");
    Ok(Json(json!({ "message": "quote deleted" })))
}

async fn generate_pdf(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let detail = SqlQuoteRepository::new(state.db_pool.clone())
        .detail(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("quote"))?;

    let bytes =
        render_quote_pdf(&detail).map_err(|error| ServiceError::Render(error.to_string()))?;

    info!(event_name = "quote.pdf_generated", quote_id = id, size = bytes.len(), "pdf rendered");
    Ok(pdf_response(id, bytes))
}

#[derive(Debug, Deserialize)]
struct SendQuoteEmailRequest {
    quote_id: i64,
    #[serde(default)]
    emails: Option<Vec<String>>,
    #[serde(default)]
    attachment_type: Option<i64>,
}

async fn send_quote_email(
    State(state): State<AppState>,
    Json(body): Json<SendQuoteEmailRequest>,
) -> Result<Json<SendOutcome>, ApiError> {
    if let Some(emails) = &body.emails {
        if emails.iter().any(|email| !email.contains('@')) {
            return Err(ServiceError::validation("recipient list contains an invalid address").into());
        }
    }
    let filter = body.attachment_type.map(AttachmentKind::parse).transpose()?;

    let outcome = dispatch_quote_email(&state, body.quote_id, body.emails, filter).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct UpdateItemRequest {
    price: f64,
    quantity: i64,
    tax: i64,
}

async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_line(body.price, body.quantity, body.tax)?;

    let updated = SqlQuoteRepository::new(state.db_pool.clone())
        .update_item(id, body.price, body.quantity, body.tax)
        .await?;
    if !updated {
        return Err(ServiceError::not_found("quote line item").into());
    }
    Ok(Json(json!({ "message": "quote line item updated" })))
}

async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = SqlQuoteRepository::new(state.db_pool.clone()).delete_item(id).await?;
    if !deleted {
        return Err(ServiceError::not_found("quote line item").into());
    }
    Ok(Json(json!({ "message": "quote line item removed" })))
}
