//! Shared-secret extractors for Axum handlers.
//!
//! Each extractor checks one [`Gate`] of the [`AuthGate`] held in
//! [`AppState`]. When the gate has no configured secret the extractor
//! always succeeds.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use codimir_core::auth::Gate;

use crate::error::AppError;
use crate::state::AppState;

/// Header a worker presents before claiming, when a worker secret is configured.
pub const WORKER_SECRET_HEADER: &str = "x-worker-secret";

/// Headers that may carry the callback secret, in lookup order.
pub const CALLBACK_SECRET_HEADERS: [&str; 2] = ["x-callback-secret", "x-ci-callback-secret"];

/// Proof that the caller presented the submission secret as
/// `Authorization: Bearer <secret>`.
///
/// ```ignore
/// async fn enqueue(_auth: SubmissionAuth, ...) -> AppResult<Json<EnqueueResponse>> { ... }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SubmissionAuth;

impl FromRequestParts<AppState> for SubmissionAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers);
        state.auth.check(Gate::Submission, token)?;
        Ok(SubmissionAuth)
    }
}

/// Proof that the caller presented the worker secret in `x-worker-secret`.
#[derive(Debug, Clone, Copy)]
pub struct WorkerAuth;

impl FromRequestParts<AppState> for WorkerAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = header_str(&parts.headers, WORKER_SECRET_HEADER);
        state.auth.check(Gate::Worker, presented)?;
        Ok(WorkerAuth)
    }
}

/// Callback secret taken from the request headers, if any.
///
/// Status reports may also carry the secret in the JSON body, so this
/// extractor never rejects; the handler checks the gate once the body is
/// parsed.
#[derive(Debug, Clone, Default)]
pub struct CallbackSecret(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for CallbackSecret {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let secret = CALLBACK_SECRET_HEADERS
            .iter()
            .find_map(|name| header_str(&parts.headers, name))
            .map(str::to_string);
        Ok(CallbackSecret(secret))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, "authorization")?.strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_token_requires_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer s3cret"));
        assert_eq!(bearer_token(&headers), Some("s3cret"));

        headers.insert("authorization", HeaderValue::from_static("s3cret"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn blank_headers_count_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(WORKER_SECRET_HEADER, HeaderValue::from_static("   "));
        assert_eq!(header_str(&headers, WORKER_SECRET_HEADER), None);
    }
}
