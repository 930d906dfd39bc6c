use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use quotedesk_core::domain::attachment::{Attachment, AttachmentKind};

use super::{parse_timestamp, AttachmentRepository, RepositoryError, MAX_LIST_ROWS};
use crate::DbPool;

pub struct SqlAttachmentRepository {
    pool: DbPool,
}

impl SqlAttachmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const ATTACHMENT_COLUMNS: &str =
    "id, name, attachment_type, url, is_active, created_at, updated_at";

fn map_attachment(row: &sqlx::sqlite::SqliteRow) -> Result<Attachment, RepositoryError> {
    let raw_kind: i64 = row.try_get("attachment_type")?;
    Ok(Attachment {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        attachment_type: AttachmentKind::parse(raw_kind)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?,
        url: row.try_get("url")?,
        is_active: row.try_get("is_active")?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
        updated_at: parse_timestamp(row.try_get("updated_at")?)?,
    })
}

#[async_trait]
impl AttachmentRepository for SqlAttachmentRepository {
    async fn create(
        &self,
        name: &str,
        kind: AttachmentKind,
        url: &str,
    ) -> Result<i64, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO attachments (name, attachment_type, url, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, 1, ?, ?)",
        )
        .bind(name)
        .bind(kind.as_i64())
        .bind(url)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Attachment>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.as_ref().map(map_attachment).transpose()
    }

    async fn list(
        &self,
        is_active: bool,
        search: Option<&str>,
    ) -> Result<Vec<Attachment>, RepositoryError> {
        let pattern = search.map(|term| format!("%{}%", term.trim().to_lowercase()));
        let rows = match &pattern {
            Some(pattern) => {
                sqlx::query(&format!(
                    "SELECT {ATTACHMENT_COLUMNS} FROM attachments \
                     WHERE is_active = ? AND LOWER(name) LIKE ? \
                     ORDER BY created_at DESC LIMIT ?"
                ))
                .bind(is_active)
                .bind(pattern)
                .bind(MAX_LIST_ROWS)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {ATTACHMENT_COLUMNS} FROM attachments \
                     WHERE is_active = ? ORDER BY created_at DESC LIMIT ?"
                ))
                .bind(is_active)
                .bind(MAX_LIST_ROWS)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(map_attachment).collect()
    }

    async fn update(
        &self,
        id: i64,
        name: &str,
        kind: AttachmentKind,
        url: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE attachments SET name = ?, attachment_type = ?, url = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(name)
        .bind(kind.as_i64())
        .bind(url)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn toggle_active(&self, id: i64) -> Result<Option<bool>, RepositoryError> {
        let result = sqlx::query(
            "UPDATE attachments SET is_active = NOT is_active, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        let is_active: bool =
            sqlx::query_scalar("SELECT is_active FROM attachments WHERE id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(Some(is_active))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM attachments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_active_by_kind(
        &self,
        filter: AttachmentKind,
    ) -> Result<Vec<Attachment>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments \
             WHERE is_active = 1 AND attachment_type IN (?, ?) \
             ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(filter.as_i64())
        .bind(AttachmentKind::Both.as_i64())
        .bind(MAX_LIST_ROWS)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_attachment).collect()
    }
}
