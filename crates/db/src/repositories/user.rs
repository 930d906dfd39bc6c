use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use quotedesk_core::User;

use super::{parse_timestamp, RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, RepositoryError> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        is_admin: row.try_get("is_admin")?,
        is_active: row.try_get("is_active")?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
        updated_at: parse_timestamp(row.try_get("updated_at")?)?,
    })
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, is_admin, is_active, created_at, updated_at";

#[async_trait]
impl UserRepository for SqlUserRepository {
    async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<i64, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, is_admin, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(is_admin)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_user).transpose()
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(super::MAX_LIST_ROWS)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_user).collect()
    }

    async fn toggle_active(&self, id: i64) -> Result<Option<bool>, RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET is_active = NOT is_active, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        let is_active: bool = sqlx::query_scalar("SELECT is_active FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(Some(is_active))
    }

    async fn update_password(
        &self,
        id: i64,
        password_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
                .bind(password_hash)
                .bind(Utc::now().to_rfc3339())
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
