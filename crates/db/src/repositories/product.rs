use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use quotedesk_core::domain::product::{Product, ProductDraft};

use super::{parse_timestamp, ProductRepository, RepositoryError, MAX_LIST_ROWS};
use crate::DbPool;

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const PRODUCT_COLUMNS: &str =
    "id, product_type, name, description, price, tax, stock, is_active, created_at, updated_at";

fn map_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    Ok(Product {
        id: row.try_get("id")?,
        product_type: row.try_get("product_type")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        tax: row.try_get("tax")?,
        stock: row.try_get("stock")?,
        is_active: row.try_get("is_active")?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
        updated_at: parse_timestamp(row.try_get("updated_at")?)?,
    })
}

#[async_trait]
impl ProductRepository for SqlProductRepository {
    async fn create(&self, draft: &ProductDraft) -> Result<i64, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO products (product_type, name, description, price, tax, stock, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(draft.product_type)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(draft.tax)
        .bind(draft.stock)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_product).transpose()
    }

    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(MAX_LIST_ROWS)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_product).collect()
    }

    async fn update(&self, id: i64, draft: &ProductDraft) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET product_type = ?, name = ?, description = ?, price = ?, \
             tax = ?, stock = ?, updated_at = ? WHERE id = ?",
        )
        .bind(draft.product_type)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(draft.tax)
        .bind(draft.stock)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn toggle_active(&self, id: i64) -> Result<Option<bool>, RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET is_active = NOT is_active, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        let is_active: bool = sqlx::query_scalar("SELECT is_active FROM products WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(Some(is_active))
    }
}
