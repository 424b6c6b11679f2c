//! API error handling
//!
//! Every failure leaves the API as
//! `{ "error": <kind>, "message": ..., "retryable": bool }`.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use domain_numbering::NumberingError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Numbering(#[from] NumberingError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ApiError {
    /// HTTP status for the error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Numbering(e) => match e {
                NumberingError::SeriesNotFound(_) => StatusCode::NOT_FOUND,
                NumberingError::SeriesDepleted { .. } => StatusCode::CONFLICT,
                NumberingError::DuplicateSeries(_) => StatusCode::CONFLICT,
                NumberingError::AllocationConflict { .. } => StatusCode::SERVICE_UNAVAILABLE,
                NumberingError::DealerNotFound(_)
                | NumberingError::DealerInactive(_)
                | NumberingError::InvalidRange(_)
                | NumberingError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                NumberingError::CorruptSeries { .. } | NumberingError::Storage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Machine-readable kind
    ///
    /// Malformed requests share `validation_error` with rejected values;
    /// only the status tells them apart.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Numbering(e) => e.kind(),
            ApiError::Validation(_) | ApiError::BadRequest(_) => "validation_error",
        }
    }

    /// True if repeating the identical request may succeed
    pub fn retryable(&self) -> bool {
        match self {
            ApiError::Numbering(NumberingError::Storage(port)) => port.is_transient(),
            ApiError::Numbering(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retryable = self.retryable();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Request failed");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: self.kind().to_string(),
            message,
            retryable,
            details: None,
        };

        let mut response = (status, Json(body)).into_response();
        if retryable {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{PortError, SeriesId};

    #[test]
    fn test_allocation_conflict_is_retryable_503() {
        let error: ApiError = NumberingError::AllocationConflict {
            series_id: SeriesId::new(),
            attempts: 5,
        }
        .into();
        assert_eq!(error.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.kind(), "allocation_conflict");
        assert!(error.retryable());

        let response = error.into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }

    #[test]
    fn test_status_mapping() {
        let depleted: ApiError = NumberingError::SeriesDepleted {
            series: "MTR".to_string(),
            end_number: 10,
        }
        .into();
        assert_eq!(depleted.status(), StatusCode::CONFLICT);
        assert!(!depleted.retryable());

        let missing: ApiError = NumberingError::SeriesNotFound(SeriesId::new()).into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let range: ApiError = NumberingError::invalid_range("start > end").into();
        assert_eq!(range.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_transient_storage_is_retryable_internal_error() {
        let error: ApiError = NumberingError::Storage(PortError::timeout("commit", 5000)).into();
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.kind(), "internal_error");
        assert!(error.retryable());
    }

    #[test]
    fn test_malformed_request_is_400_validation_error() {
        let error = ApiError::BadRequest("Invalid URL".to_string());
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.kind(), "validation_error");
        assert!(!error.retryable());
    }
}
