use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use codimir_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for dispatcher errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses of
/// the form `{ "ok": false, "accepted": false, "error": ..., "code": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A dispatcher error from `codimir_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The request body could not be parsed into the expected shape.
    #[error(transparent)]
    Json(#[from] JsonRejection),

    /// A lookup by id found nothing.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// HTTP status, stable error code, and client-facing message.
    pub fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::DuplicateJob(_) => {
                    (StatusCode::CONFLICT, "DUPLICATE_JOB", core.to_string())
                }
                CoreError::QueueFull { .. } => {
                    (StatusCode::TOO_MANY_REQUESTS, "QUEUE_FULL", core.to_string())
                }
                CoreError::UnknownClaim(_) => {
                    (StatusCode::NOT_FOUND, "UNKNOWN_CLAIM", core.to_string())
                }
                CoreError::ClaimMismatch(_) => {
                    (StatusCode::FORBIDDEN, "CLAIM_MISMATCH", core.to_string())
                }
                CoreError::ClaimClosed(_) => {
                    (StatusCode::CONFLICT, "CLAIM_CLOSED", core.to_string())
                }
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Body rejections ---
            AppError::Json(rejection) => {
                (rejection.status(), "INVALID_BODY", rejection.body_text())
            }

            // --- HTTP-specific errors ---
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.classify();

        let body = json!({
            "ok": false,
            "accepted": false,
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
