//! Shared response envelope for read endpoints.
//!
//! The four protocol operations (`/enqueue`, `/claim`, `/cb`, `/health`)
//! have fixed wire shapes of their own; everything else answers with a
//! `{ "data": ... }` envelope.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// # Example
///
/// ```ignore
/// Ok(Json(DataResponse { data: snapshot }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
