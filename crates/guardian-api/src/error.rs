use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use guardian_classifier::ClassifierError;
use guardian_types::api::ErrorResponse;

use crate::auth::AuthError;
use crate::ingest::IngestError;

/// Error returned by every handler. Rendered as `{"error": ..., "code": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found() -> Self {
        ApiError::NotFound("Not found.".into())
    }

    fn status_and_body(self) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            ApiError::Auth(AuthError::Missing) => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_MISSING",
                AuthError::Missing.to_string(),
            ),
            ApiError::Auth(err @ AuthError::Invalid(_)) => {
                (StatusCode::UNAUTHORIZED, "TOKEN_INVALID", err.to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Classifier(err) => {
                warn!("Classifier error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CLASSIFIER_ERROR",
                    err.diagnostic(),
                )
            }
            ApiError::Internal(detail) => {
                error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An unexpected error occurred".into(),
                )
            }
        };

        (
            status,
            ErrorResponse {
                error: message,
                code: code.into(),
            },
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Validation(msg) => ApiError::Validation(msg),
            IngestError::Unauthenticated => ApiError::Auth(AuthError::Missing),
            IngestError::Classifier(err) => ApiError::Classifier(err),
            IngestError::Store(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(err: ApiError) -> (StatusCode, ErrorResponse) {
        err.status_and_body()
    }

    #[test]
    fn validation_is_a_client_error() {
        let (status, body) = render(ApiError::Validation("Image file is required.".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "VALIDATION_ERROR");
        assert_eq!(body.error, "Image file is required.");
    }

    #[test]
    fn auth_errors_are_unauthorized() {
        let (status, body) = render(AuthError::Missing.into());
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.code, "TOKEN_MISSING");

        let (status, body) = render(AuthError::Invalid("bad signature".into()).into());
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.code, "TOKEN_INVALID");
    }

    #[test]
    fn classifier_errors_expose_their_diagnostic() {
        let err = ClassifierError::Status {
            status: 503,
            body: "upstream unavailable".into(),
        };
        let (status, body) = render(err.into());
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "CLASSIFIER_ERROR");
        assert_eq!(body.error, "upstream unavailable");
    }

    #[test]
    fn store_errors_hide_their_detail() {
        let (status, body) = render(IngestError::Store("disk I/O error".into()).into());
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "INTERNAL_ERROR");
        assert!(!body.error.contains("disk"));
    }
}
