//! Read-side handlers for submitted jobs.
//!
//! Both endpoints require the submission secret via [`SubmissionAuth`].

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use codimir_core::job::JobSnapshot;
use futures::stream::{self, Stream, StreamExt};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::SubmissionAuth;
use crate::response::DataResponse;
use crate::state::AppState;

/// SSE event name of the first message on a job stream.
pub const SNAPSHOT_EVENT: &str = "snapshot";

/// SSE event name of every subsequent status change.
pub const STATUS_EVENT: &str = "status";

async fn find_job(state: &AppState, job_id: &str) -> AppResult<JobSnapshot> {
    state
        .dispatcher
        .job(job_id)
        .await
        .ok_or_else(|| AppError::NotFound {
            entity: "Job",
            id: job_id.to_string(),
        })
}

/// GET /jobs/{job_id}
pub async fn get_job(
    _auth: SubmissionAuth,
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<DataResponse<JobSnapshot>>> {
    let snapshot = find_job(&state, &job_id).await?;
    Ok(Json(DataResponse { data: snapshot }))
}

/// GET /jobs/{job_id}/events
///
/// Server-sent events: one `snapshot` event with the job's current state,
/// then a `status` event per applied change. The stream ends after the job
/// reaches a terminal state.
pub async fn stream_job_events(
    _auth: SubmissionAuth,
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    // Subscribe before reading the snapshot so no change falls in between.
    let watch = state.dispatcher.watch(job_id.clone()).await;
    let snapshot = find_job(&state, &job_id).await?;

    tracing::debug!(job_id = %job_id, state = %snapshot.state, "Job event stream opened");

    let follow = (!snapshot.state.is_terminal()).then_some(watch);
    let initial = Event::default().event(SNAPSHOT_EVENT).json_data(&snapshot);

    let changes = stream::unfold(follow, |watch| async move {
        let mut watch = watch?;
        let change = watch.next().await?;
        let event = Event::default().event(STATUS_EVENT).json_data(&change);
        Some((event, Some(watch)))
    });

    let events = stream::once(async move { initial }).chain(changes);
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
