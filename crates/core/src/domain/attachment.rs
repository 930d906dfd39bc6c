use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// Applicability of a reusable mail attachment. Stored as its wire value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachmentKind {
    /// Bundled with product quotes only.
    Product,
    /// Bundled with service quotes only.
    Service,
    /// Bundled regardless of quote kind.
    Both,
}

impl AttachmentKind {
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Product => 1,
            Self::Service => 2,
            Self::Both => 3,
        }
    }

    pub fn parse(raw: i64) -> Result<Self, ServiceError> {
        match raw {
            1 => Ok(Self::Product),
            2 => Ok(Self::Service),
            3 => Ok(Self::Both),
            other => Err(ServiceError::validation(format!(
                "invalid attachment type `{other}` (expected 1=product, 2=service or 3=both)"
            ))),
        }
    }

    /// Whether an attachment of this kind is included when sending under
    /// `filter`. Kind 3 matches either filter.
    pub fn matches(&self, filter: AttachmentKind) -> bool {
        matches!(self, Self::Both) || *self == filter
    }
}

/// A reusable supplementary file (catalog, brochure) bundled into outgoing
/// quote emails. A row never exists without its backing file on disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub name: String,
    pub attachment_type: AttachmentKind,
    pub url: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
