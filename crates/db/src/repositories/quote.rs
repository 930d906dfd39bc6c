use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Row};

use quotedesk_core::domain::quote::{
    ClientHeader, QuoteDetail, QuoteItemDetail, QuoteItemInput, QuoteStatus,
};

use super::{parse_timestamp, QuoteRepository, RepositoryError, MAX_LIST_ROWS};
use crate::DbPool;

/// Typed listing filter: newest-first, optional status, optional
/// case-insensitive substring search on the joined client's email or id
/// number. `status: None` is the "All" sentinel.
#[derive(Clone, Debug, Default)]
pub struct QuoteListFilter {
    pub status: Option<QuoteStatus>,
    pub search: Option<String>,
}

/// One listing row: quote scalars plus the client header the UI shows.
#[derive(Clone, Debug, Serialize)]
pub struct QuoteListRow {
    pub id: i64,
    pub client_id: i64,
    pub total: f64,
    pub status: QuoteStatus,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub client_fullname: String,
    pub client_company_name: Option<String>,
    pub client_contact: String,
    pub client_email: String,
}

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_status(raw: &str) -> Result<QuoteStatus, RepositoryError> {
    QuoteStatus::parse(raw).map_err(|error| RepositoryError::Decode(error.to_string()))
}

async fn insert_items(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    quote_id: i64,
    items: &[QuoteItemInput],
    now: &str,
) -> Result<(), RepositoryError> {
    for item in items {
        sqlx::query(
            "INSERT INTO quote_items (quote_id, product_id, price, quantity, tax, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(quote_id)
        .bind(item.product_id)
        .bind(item.price)
        .bind(item.quantity)
        .bind(item.tax)
        .bind(now)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn create_with_items(
        &self,
        client_id: i64,
        notes: Option<&str>,
        items: &[QuoteItemInput],
        total: f64,
        created_by: &str,
    ) -> Result<i64, RepositoryError> {
        // Dropping the transaction without commit rolls everything back, so
        // every early return below leaves no partial rows.
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        let quote_id = sqlx::query(
            "INSERT INTO quotes (client_id, total, status, notes, created_by, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(client_id)
        .bind(total)
        .bind(QuoteStatus::Pending.as_str())
        .bind(notes)
        .bind(created_by)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        insert_items(&mut tx, quote_id, items, &now).await?;

        tx.commit().await?;
        Ok(quote_id)
    }

    async fn update_with_items(
        &self,
        id: i64,
        client_id: i64,
        notes: Option<&str>,
        status: QuoteStatus,
        items: &[QuoteItemInput],
        total: f64,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        let updated = sqlx::query(
            "UPDATE quotes SET client_id = ?, total = ?, status = ?, notes = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(client_id)
        .bind(total)
        .bind(status.as_str())
        .bind(notes)
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Ok(false);
        }

        // Replace-all: the submitted set is the whole item set.
        sqlx::query("DELETE FROM quote_items WHERE quote_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_items(&mut tx, id, items, &now).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn delete_with_items(&self, id: i64) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM quote_items WHERE quote_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM quotes WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn set_status(&self, id: i64, status: QuoteStatus) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE quotes SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: &QuoteListFilter) -> Result<Vec<QuoteListRow>, RepositoryError> {
        let mut builder = QueryBuilder::new(
            "SELECT q.id, q.client_id, q.total, q.status, q.notes, q.created_by, q.created_at, \
                    c.fullname AS client_fullname, c.company_name AS client_company_name, \
                    c.contact AS client_contact, c.email AS client_email \
             FROM quotes q \
             JOIN clients c ON c.id = q.client_id \
             WHERE 1=1",
        );

        if let Some(status) = filter.status {
            builder.push(" AND q.status = ");
            builder.push_bind(status.as_str());
        }

        let search = filter.search.as_deref().map(str::trim).filter(|term| !term.is_empty());
        if let Some(term) = search {
            let pattern = format!("%{}%", term.to_lowercase());
            builder.push(" AND (LOWER(c.email) LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR LOWER(c.id_number) LIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        builder.push(" ORDER BY q.created_at DESC LIMIT ");
        builder.push_bind(MAX_LIST_ROWS);

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(QuoteListRow {
                    id: row.try_get("id")?,
                    client_id: row.try_get("client_id")?,
                    total: row.try_get("total")?,
                    status: decode_status(row.try_get("status")?)?,
                    notes: row.try_get("notes")?,
                    created_by: row.try_get("created_by")?,
                    created_at: parse_timestamp(row.try_get("created_at")?)?,
                    client_fullname: row.try_get("client_fullname")?,
                    client_company_name: row.try_get("client_company_name")?,
                    client_contact: row.try_get("client_contact")?,
                    client_email: row.try_get("client_email")?,
                })
            })
            .collect()
    }

    async fn detail(&self, id: i64) -> Result<Option<QuoteDetail>, RepositoryError> {
        let quote_row = sqlx::query(
            "SELECT q.id, q.total, q.status, q.notes, q.created_by, q.created_at, \
                    c.id AS client_id, c.fullname, c.company_name, c.id_number, c.email, c.contact \
             FROM quotes q \
             JOIN clients c ON c.id = q.client_id \
             WHERE q.id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(quote_row) = quote_row else {
            return Ok(None);
        };

        let item_rows = sqlx::query(
            "SELECT qi.id, qi.product_id, qi.price, qi.quantity, qi.tax, \
                    p.name AS product_name, p.description AS product_description \
             FROM quote_items qi \
             JOIN products p ON p.id = qi.product_id \
             WHERE qi.quote_id = ? \
             ORDER BY qi.id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let items = item_rows
            .iter()
            .map(|row| {
                Ok(QuoteItemDetail {
                    id: row.try_get("id")?,
                    product_id: row.try_get("product_id")?,
                    price: row.try_get("price")?,
                    quantity: row.try_get("quantity")?,
                    tax: row.try_get("tax")?,
                    product_name: row.try_get("product_name")?,
                    product_description: row.try_get("product_description")?,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(Some(QuoteDetail {
            id: quote_row.try_get("id")?,
            total: quote_row.try_get("total")?,
            status: decode_status(quote_row.try_get("status")?)?,
            notes: quote_row.try_get("notes")?,
            created_by: quote_row.try_get("created_by")?,
            created_at: parse_timestamp(quote_row.try_get("created_at")?)?,
            client: ClientHeader {
                id: quote_row.try_get("client_id")?,
                fullname: quote_row.try_get("fullname")?,
                company_name: quote_row.try_get("company_name")?,
                id_number: quote_row.try_get("id_number")?,
                email: quote_row.try_get("email")?,
                contact: quote_row.try_get("contact")?,
            },
            items,
        }))
    }

    async fn update_item(
        &self,
        item_id: i64,
        price: f64,
        quantity: i64,
        tax: i64,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE quote_items SET price = ?, quantity = ?, tax = ? WHERE id = ?",
        )
        .bind(price)
        .bind(quantity)
        .bind(tax)
        .bind(item_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_item(&self, item_id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM quote_items WHERE id = ?")
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
