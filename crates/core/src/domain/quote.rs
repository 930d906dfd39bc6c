use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// Lifecycle status of a quote. The set is closed; anything else coming in
/// over the wire is a validation error, never a stored value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteStatus {
    Pending,
    Accepted,
    Rejected,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Accepted => "Accepted",
            Self::Rejected => "Rejected",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        match raw.trim() {
            "Pending" => Ok(Self::Pending),
            "Accepted" => Ok(Self::Accepted),
            "Rejected" => Ok(Self::Rejected),
            other => Err(ServiceError::validation(format!(
                "invalid status `{other}` (expected Pending, Accepted or Rejected)"
            ))),
        }
    }
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: i64,
    pub client_id: i64,
    pub total: f64,
    pub status: QuoteStatus,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted line item: the price/quantity/tax snapshot taken when the
/// quote was written, deliberately decoupled from the live product row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteItem {
    pub id: i64,
    pub quote_id: i64,
    pub product_id: i64,
    pub price: f64,
    pub quantity: i64,
    pub tax: i64,
}

/// Caller-submitted line item for quote create/update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteItemInput {
    pub product_id: i64,
    pub price: f64,
    pub quantity: i64,
    pub tax: i64,
}

/// Sum of tax-inclusive line totals. This is the stored quote total;
/// caller-supplied totals are advisory only.
pub fn computed_total(items: &[QuoteItemInput]) -> f64 {
    items.iter().map(|item| item.price * item.quantity as f64).sum()
}

/// Client fields carried alongside a quote in listings and detail views.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientHeader {
    pub id: i64,
    pub fullname: String,
    pub company_name: Option<String>,
    pub id_number: String,
    pub email: String,
    pub contact: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteItemDetail {
    pub id: i64,
    pub product_id: i64,
    pub price: f64,
    pub quantity: i64,
    pub tax: i64,
    pub product_name: String,
    pub product_description: String,
}

/// A quote joined with its client header and itemized lines; the renderer
/// and the mail dispatcher both consume this snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteDetail {
    pub id: i64,
    pub total: f64,
    pub status: QuoteStatus,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub client: ClientHeader,
    pub items: Vec<QuoteItemDetail>,
}

#[cfg(test)]
mod tests {
    use super::{computed_total, QuoteItemInput, QuoteStatus};

    #[test]
    fn parses_the_closed_status_set() {
        assert_eq!(QuoteStatus::parse("Pending").unwrap(), QuoteStatus::Pending);
        assert_eq!(QuoteStatus::parse("Accepted").unwrap(), QuoteStatus::Accepted);
        assert_eq!(QuoteStatus::parse(" Rejected ").unwrap(), QuoteStatus::Rejected);
    }

    #[test]
    fn rejects_statuses_outside_the_set() {
        let error = QuoteStatus::parse("Approved").expect_err("Approved is not a valid status");
        assert!(error.to_string().contains("Approved"));
    }

    #[test]
    fn total_is_the_sum_of_tax_inclusive_line_totals() {
        let items = vec![
            QuoteItemInput { product_id: 1, price: 119.0, quantity: 2, tax: 19 },
            QuoteItemInput { product_id: 2, price: 50.0, quantity: 1, tax: 0 },
        ];
        assert_eq!(computed_total(&items), 288.0);
    }
}
