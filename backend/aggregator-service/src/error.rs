/// Error types for the aggregator service
///
/// The request-level taxonomy is closed: a caller can always tell a bad request,
/// a failed store and a missing single item apart from "zero matching items".
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

use crate::stores::StoreError;

/// Result type for aggregator-service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed or out-of-range request parameter. Stores are never contacted.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A backing store failed, timed out, or is short-circuited by its breaker.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Single-item lookup found no score entry or no content entry.
    #[error("Not found: {0}")]
    NotFoundSingle(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidParameter(_) => "invalid_parameter",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::NotFoundSingle(_) => "not_found",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFoundSingle(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        HttpResponse::build(status).json(serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
            "status": status.as_u16(),
        }))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::InvalidParameter("n".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::StoreUnavailable("redis".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::NotFoundSingle("p1".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_every_store_error_is_unavailable() {
        let errors = [
            StoreError::Unavailable {
                store: "score",
                reason: "connection refused".into(),
            },
            StoreError::Timeout {
                store: "content",
                after: Duration::from_millis(10),
            },
            StoreError::CircuitOpen { store: "score" },
            StoreError::Malformed {
                store: "score",
                reason: "score is not an integer".into(),
            },
        ];
        for err in errors {
            let app: AppError = err.into();
            assert_eq!(app.kind(), "store_unavailable");
        }
    }
}
