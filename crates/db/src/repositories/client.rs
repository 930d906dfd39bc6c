use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use quotedesk_core::domain::client::{Client, ClientDraft, ClientEmail};

use super::{parse_timestamp, ClientRepository, RepositoryError, MAX_LIST_ROWS};
use crate::DbPool;

pub struct SqlClientRepository {
    pool: DbPool,
}

impl SqlClientRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const CLIENT_COLUMNS: &str = "id, identification_type, fullname, company_name, id_number, \
     contact, email, address, department, city, is_active, created_at, updated_at";

fn map_client(row: &sqlx::sqlite::SqliteRow) -> Result<Client, RepositoryError> {
    Ok(Client {
        id: row.try_get("id")?,
        identification_type: row.try_get("identification_type")?,
        fullname: row.try_get("fullname")?,
        company_name: row.try_get("company_name")?,
        id_number: row.try_get("id_number")?,
        contact: row.try_get("contact")?,
        email: row.try_get("email")?,
        address: row.try_get("address")?,
        department: row.try_get("department")?,
        city: row.try_get("city")?,
        is_active: row.try_get("is_active")?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
        updated_at: parse_timestamp(row.try_get("updated_at")?)?,
    })
}

#[async_trait]
impl ClientRepository for SqlClientRepository {
    async fn id_number_or_email_taken(
        &self,
        id_number: &str,
        email: &str,
        exclude: Option<i64>,
    ) -> Result<bool, RepositoryError> {
        // Spans inactive rows as well: reactivating an old client must not
        // open the door to a duplicate identity.
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM clients \
             WHERE (id_number = ? OR email = ?) AND id != ?",
        )
        .bind(id_number)
        .bind(email)
        .bind(exclude.unwrap_or(-1))
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn create(&self, draft: &ClientDraft) -> Result<i64, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO clients (identification_type, fullname, company_name, id_number, \
             contact, email, address, department, city, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(draft.identification_type)
        .bind(&draft.fullname)
        .bind(&draft.company_name)
        .bind(&draft.id_number)
        .bind(&draft.contact)
        .bind(&draft.email)
        .bind(&draft.address)
        .bind(&draft.department)
        .bind(&draft.city)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Client>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_client).transpose()
    }

    async fn list(&self) -> Result<Vec<Client>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(MAX_LIST_ROWS)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_client).collect()
    }

    async fn update(&self, id: i64, draft: &ClientDraft) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE clients SET identification_type = ?, fullname = ?, company_name = ?, \
             id_number = ?, contact = ?, email = ?, address = ?, department = ?, city = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(draft.identification_type)
        .bind(&draft.fullname)
        .bind(&draft.company_name)
        .bind(&draft.id_number)
        .bind(&draft.contact)
        .bind(&draft.email)
        .bind(&draft.address)
        .bind(&draft.department)
        .bind(&draft.city)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn toggle_active(&self, id: i64) -> Result<Option<bool>, RepositoryError> {
        let result = sqlx::query(
            "UPDATE clients SET is_active = NOT is_active, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        let is_active: bool = sqlx::query_scalar("SELECT is_active FROM clients WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(Some(is_active))
    }

    async fn search_active(&self, term: &str) -> Result<Vec<Client>, RepositoryError> {
        let pattern = format!("%{}%", term.trim().to_lowercase());
        let rows = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients \
             WHERE is_active = 1 AND (LOWER(fullname) LIKE ? OR LOWER(email) LIKE ? OR LOWER(id_number) LIKE ?) \
             ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(MAX_LIST_ROWS)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_client).collect()
    }

    async fn email_taken(&self, client_id: i64, email: &str) -> Result<bool, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM client_emails WHERE client_id = ? AND email = ?",
        )
        .bind(client_id)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn add_email(&self, client_id: i64, email: &str) -> Result<i64, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO client_emails (client_id, email, created_at) VALUES (?, ?, ?)",
        )
        .bind(client_id)
        .bind(email)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn list_emails(&self, client_id: i64) -> Result<Vec<ClientEmail>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, client_id, email FROM client_emails WHERE client_id = ? ORDER BY id",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(ClientEmail {
                    id: row.try_get("id")?,
                    client_id: row.try_get("client_id")?,
                    email: row.try_get("email")?,
                })
            })
            .collect()
    }

    async fn remove_email(&self, client_id: i64, email: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM client_emails WHERE client_id = ? AND email = ?")
            .bind(client_id)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
