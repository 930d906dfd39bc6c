use thiserror::Error;

/// Service-level failure taxonomy shared by every component.
///
/// Handlers map each variant onto exactly one HTTP status; the variant
/// message is operator-facing while [`ServiceError::user_message`] is the
/// safe client-facing text.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("transaction failed: {0}")]
    Transaction(String),
    #[error("render failed: {0}")]
    Render(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound(entity.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Client-safe message. Internals (SQL text, file paths, SMTP chatter)
    /// never leave through this surface.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Conflict(message) => message.clone(),
            Self::NotFound(entity) => format!("{entity} not found"),
            Self::Unauthorized(_) => "invalid or missing credentials".to_owned(),
            Self::Forbidden(_) => "insufficient permissions for this action".to_owned(),
            Self::Transaction(_) => "the write could not be completed".to_owned(),
            Self::Render(_) => "document generation failed".to_owned(),
            Self::Send(_) => "the message could not be delivered".to_owned(),
            Self::Internal(_) => "an unexpected internal error occurred".to_owned(),
        }
    }
}
