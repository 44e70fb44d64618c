//! Handlers for the dispatcher protocol: `/enqueue`, `/claim`, and `/cb`.
//!
//! The wire shapes are fixed by the worker and submitter contract, so these
//! handlers answer with bare JSON bodies rather than the `{data}` envelope.

use axum::extract::State;
use axum::Json;
use codimir_core::auth::Gate;
use codimir_core::dispatcher::StatusReport;
use codimir_core::error::CoreError;
use codimir_core::job::{ClaimedJob, JobInput, JobState};
use codimir_core::types::{JobId, WorkerId};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::middleware::auth::{CallbackSecret, SubmissionAuth, WorkerAuth};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Response to a successful `POST /enqueue`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    pub accepted: bool,
    pub job_id: JobId,
    pub queue_length: usize,
    pub position: usize,
}

/// Body of `POST /claim`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub worker_id: WorkerId,
}

/// Response to `POST /claim`; `job` is `null` when the queue is empty.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub job: Option<ClaimedJob>,
}

/// Body of `POST /cb`: a status report, optionally carrying the callback
/// secret when the worker cannot set headers.
#[derive(Debug, Deserialize)]
pub struct CallbackBody {
    #[serde(flatten)]
    pub report: StatusReport,
    #[serde(default)]
    pub secret: Option<String>,
}

/// Response to an accepted status report.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResponse {
    pub ok: bool,
    pub job_id: JobId,
    pub state: JobState,
}

// ---------------------------------------------------------------------------
// Enqueue
// ---------------------------------------------------------------------------

/// POST /enqueue
///
/// Submit a job. The job is recorded as `pending` and appended to the tail
/// of the queue.
pub async fn enqueue(
    _auth: SubmissionAuth,
    State(state): State<AppState>,
    AppJson(input): AppJson<JobInput>,
) -> AppResult<Json<EnqueueResponse>> {
    input
        .validate()
        .map_err(|e| CoreError::Validation(e.to_string()))?;

    let receipt = state.dispatcher.enqueue(input).await?;

    Ok(Json(EnqueueResponse {
        accepted: true,
        job_id: receipt.job_id,
        queue_length: receipt.queue_length,
        position: receipt.position,
    }))
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

/// POST /claim
///
/// Hand the oldest pending job to the calling worker, or `{job: null}` if
/// nothing is pending.
pub async fn claim(
    _auth: WorkerAuth,
    State(state): State<AppState>,
    AppJson(request): AppJson<ClaimRequest>,
) -> AppResult<Json<ClaimResponse>> {
    let job = state.dispatcher.claim(&request.worker_id).await?;
    if job.is_none() {
        tracing::trace!(worker_id = %request.worker_id, "Claim found an empty queue");
    }
    Ok(Json(ClaimResponse { job }))
}

// ---------------------------------------------------------------------------
// Status report
// ---------------------------------------------------------------------------

/// POST /cb
///
/// Apply a worker's status report to the job held by its claim. The
/// callback secret is read from `x-callback-secret`, `x-ci-callback-secret`,
/// or the body's `secret` field, in that order.
pub async fn report_status(
    State(state): State<AppState>,
    CallbackSecret(header_secret): CallbackSecret,
    AppJson(body): AppJson<CallbackBody>,
) -> AppResult<Json<CallbackResponse>> {
    let presented = header_secret.or(body.secret);
    state.auth.check(Gate::Callback, presented.as_deref())?;

    let snapshot = state.dispatcher.report_status(body.report).await?;

    Ok(Json(CallbackResponse {
        ok: true,
        job_id: snapshot.job_id,
        state: snapshot.state,
    }))
}
