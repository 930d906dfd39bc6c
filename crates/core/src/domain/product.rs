use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub product_type: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    /// Tax rate as an integer percentage; prices are tax-inclusive.
    pub tax: i64,
    pub stock: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub product_type: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub tax: i64,
    pub stock: i64,
}
