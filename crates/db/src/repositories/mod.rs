use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use quotedesk_core::domain::attachment::{Attachment, AttachmentKind};
use quotedesk_core::domain::client::{Client, ClientDraft, ClientEmail};
use quotedesk_core::domain::product::{Product, ProductDraft};
use quotedesk_core::domain::quote::{QuoteDetail, QuoteItemInput, QuoteStatus};

pub mod attachment;
pub mod client;
pub mod product;
pub mod quote;
pub mod user;

pub use attachment::SqlAttachmentRepository;
pub use client::SqlClientRepository;
pub use product::SqlProductRepository;
pub use quote::{QuoteListFilter, QuoteListRow, SqlQuoteRepository};
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Row ceiling applied to every unbounded listing; there is no cursor-based
/// paging in this system.
pub const MAX_LIST_ROWS: i64 = 500;

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("bad timestamp `{raw}`: {error}")))
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<i64, RepositoryError>;
    async fn find_by_id(
        &self,
        id: i64,
    ) -> Result<Option<quotedesk_core::User>, RepositoryError>;
    async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<quotedesk_core::User>, RepositoryError>;
    async fn list(&self) -> Result<Vec<quotedesk_core::User>, RepositoryError>;
    /// Flip `is_active`; returns the new state, or None when the user is absent.
    async fn toggle_active(&self, id: i64) -> Result<Option<bool>, RepositoryError>;
    async fn update_password(&self, id: i64, password_hash: &str)
        -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// True when another client (active or inactive) already uses the id
    /// number or email. `exclude` skips one row, for updates.
    async fn id_number_or_email_taken(
        &self,
        id_number: &str,
        email: &str,
        exclude: Option<i64>,
    ) -> Result<bool, RepositoryError>;
    async fn create(&self, draft: &ClientDraft) -> Result<i64, RepositoryError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Client>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Client>, RepositoryError>;
    async fn update(&self, id: i64, draft: &ClientDraft) -> Result<bool, RepositoryError>;
    async fn toggle_active(&self, id: i64) -> Result<Option<bool>, RepositoryError>;
    /// Active clients whose name, email or id number contains `term`.
    async fn search_active(&self, term: &str) -> Result<Vec<Client>, RepositoryError>;
    async fn email_taken(&self, client_id: i64, email: &str) -> Result<bool, RepositoryError>;
    async fn add_email(&self, client_id: i64, email: &str) -> Result<i64, RepositoryError>;
    async fn list_emails(&self, client_id: i64) -> Result<Vec<ClientEmail>, RepositoryError>;
    async fn remove_email(&self, client_id: i64, email: &str) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create(&self, draft: &ProductDraft) -> Result<i64, RepositoryError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Product>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Product>, RepositoryError>;
    async fn update(&self, id: i64, draft: &ProductDraft) -> Result<bool, RepositoryError>;
    async fn toggle_active(&self, id: i64) -> Result<Option<bool>, RepositoryError>;
}

#[async_trait]
pub trait AttachmentRepository: Send + Sync {
    async fn create(
        &self,
        name: &str,
        kind: AttachmentKind,
        url: &str,
    ) -> Result<i64, RepositoryError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Attachment>, RepositoryError>;
    async fn list(
        &self,
        is_active: bool,
        search: Option<&str>,
    ) -> Result<Vec<Attachment>, RepositoryError>;
    async fn update(
        &self,
        id: i64,
        name: &str,
        kind: AttachmentKind,
        url: &str,
    ) -> Result<bool, RepositoryError>;
    async fn toggle_active(&self, id: i64) -> Result<Option<bool>, RepositoryError>;
    async fn delete(&self, id: i64) -> Result<bool, RepositoryError>;
    /// Active attachments bundled under `filter`: kind = filter or kind = Both.
    async fn list_active_by_kind(
        &self,
        filter: AttachmentKind,
    ) -> Result<Vec<Attachment>, RepositoryError>;
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    /// Insert the quote row and all line items in one transaction; any
    /// failure rolls the whole write back.
    async fn create_with_items(
        &self,
        client_id: i64,
        notes: Option<&str>,
        items: &[QuoteItemInput],
        total: f64,
        created_by: &str,
    ) -> Result<i64, RepositoryError>;
    /// Replace-all update: scalar fields are rewritten, the existing item
    /// set is deleted and the submitted set inserted, atomically. Returns
    /// false when the quote does not exist.
    async fn update_with_items(
        &self,
        id: i64,
        client_id: i64,
        notes: Option<&str>,
        status: QuoteStatus,
        items: &[QuoteItemInput],
        total: f64,
    ) -> Result<bool, RepositoryError>;
    async fn delete_with_items(&self, id: i64) -> Result<bool, RepositoryError>;
    async fn set_status(&self, id: i64, status: QuoteStatus) -> Result<bool, RepositoryError>;
    async fn list(&self, filter: &QuoteListFilter) -> Result<Vec<QuoteListRow>, RepositoryError>;
    async fn detail(&self, id: i64) -> Result<Option<QuoteDetail>, RepositoryError>;
    async fn update_item(
        &self,
        item_id: i64,
        price: f64,
        quantity: i64,
        tax: i64,
    ) -> Result<bool, RepositoryError>;
    async fn delete_item(&self, item_id: i64) -> Result<bool, RepositoryError>;
}
