pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{dispatch, jobs};
use crate::state::AppState;

/// Build the dispatcher route tree.
///
/// ```text
/// POST   /enqueue                -> enqueue            (submission secret)
/// POST   /claim                  -> claim              (worker secret, if set)
/// POST   /cb                     -> report_status      (callback secret)
/// GET    /jobs/{job_id}          -> get_job            (submission secret)
/// GET    /jobs/{job_id}/events   -> stream_job_events  (submission secret)
/// ```
pub fn dispatch_routes() -> Router<AppState> {
    Router::new()
        .route("/enqueue", post(dispatch::enqueue))
        .route("/claim", post(dispatch::claim))
        .route("/cb", post(dispatch::report_status))
        .route("/jobs/{job_id}", get(jobs::get_job))
        .route("/jobs/{job_id}/events", get(jobs::stream_job_events))
}
