use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use quotedesk_core::ServiceError;
use quotedesk_db::repositories::RepositoryError;
use serde_json::json;
use tracing::error;

/// Axum-facing wrapper around the service taxonomy. Every handler returns
/// `Result<_, ApiError>`; the response body carries only the user-safe
/// message while the operator detail goes to the log.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        Self(error)
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        Self(ServiceError::Internal(error.to_string()))
    }
}

/// Repository failures inside an atomic multi-row write surface as a single
/// transaction failure; the rollback already happened on the repo side.
pub fn tx_failure(error: RepositoryError) -> ApiError {
    ApiError(ServiceError::Transaction(error.to_string()))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Transaction(_)
            | ServiceError::Render(_)
            | ServiceError::Send(_)
            | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(event_name = "api.error.internal", error = %self.0, "request failed");
        }

        (status, Json(json!({ "message": self.0.user_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use quotedesk_core::ServiceError;

    use super::ApiError;

    #[test]
    fn maps_each_class_to_its_status() {
        let cases = [
            (ServiceError::Validation("v".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Conflict("c".into()), StatusCode::CONFLICT),
            (ServiceError::NotFound("quote".into()), StatusCode::NOT_FOUND),
            (ServiceError::Unauthorized("u".into()), StatusCode::UNAUTHORIZED),
            (ServiceError::Forbidden("f".into()), StatusCode::FORBIDDEN),
            (ServiceError::Transaction("t".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ServiceError::Render("r".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ServiceError::Send("s".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ServiceError::Internal("i".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            let response = ApiError(error).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
