use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub identification_type: i64,
    pub fullname: String,
    pub company_name: Option<String>,
    pub id_number: String,
    pub contact: String,
    pub email: String,
    pub address: String,
    pub department: String,
    pub city: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-submitted client fields for create/update.
///
/// `id_number` and `email` must be unique across active and inactive rows;
/// the repository pre-checks both so duplicates surface as a domain Conflict
/// instead of a raw constraint violation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientDraft {
    pub identification_type: i64,
    pub fullname: String,
    pub company_name: Option<String>,
    pub id_number: String,
    pub contact: String,
    pub email: String,
    pub address: String,
    pub department: String,
    pub city: String,
}

/// Alternate recipient address owned by a client, unique per (client, email).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientEmail {
    pub id: i64,
    pub client_id: i64,
    pub email: String,
}
