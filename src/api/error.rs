use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;

use crate::domain::tracking::TrackingError;
use crate::utils::IsTransient;

// ============================================================================
// API Errors
// ============================================================================
//
// Every failure leaves the API as
//   {"detail": "...", "error_code": "...", "error_type": "..."}
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error("CPF must contain 11 digits, got '{0}'")]
    InvalidCpf(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    detail: String,
    error_code: &'a str,
    error_type: &'a str,
}

impl ApiError {
    fn error_code(&self) -> &'static str {
        match self {
            ApiError::Tracking(e) => e.error_code(),
            ApiError::InvalidCpf(_) => "INVALID_CPF",
            ApiError::BadRequest(_) => "VALIDATION_ERROR",
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ApiError::Tracking(e) => e.kind(),
            ApiError::InvalidCpf(_) => "InvalidCpf",
            ApiError::BadRequest(_) => "BadRequest",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Tracking(e) => match e {
                TrackingError::NotFound(_) => StatusCode::NOT_FOUND,
                TrackingError::DuplicateOrder(_) => StatusCode::CONFLICT,
                TrackingError::UnknownEventType(_) | TrackingError::MalformedEvent(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                TrackingError::Store(store) if store.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
                TrackingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            ApiError::InvalidCpf(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        HttpResponse::build(status).json(ErrorBody {
            detail: self.to_string(),
            error_code: self.error_code(),
            error_type: self.error_type(),
        })
    }
}
