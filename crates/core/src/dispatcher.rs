//! The dispatcher: single owner of the queue, the job records, and the
//! claim map.
//!
//! Lock discipline:
//!
//! - `state` guards the queue, the store index, and the claim maps. Dequeue,
//!   claim-id minting, and claim registration all happen under one
//!   acquisition, so no two callers can observe the same head of queue.
//! - Each claim and each record has its own mutex. Status reports only take
//!   `state` briefly to look the claim up, then work under the claim lock,
//!   so reports for different claims run in parallel.
//! - Order is always `state -> claim -> record`. Nothing acquires `state`
//!   while holding a claim or record lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};

use crate::error::CoreError;
use crate::feed::{JobWatch, StatusChange, StatusFeed};
use crate::job::{
    generate_job_id, merge_metadata, ClaimedJob, JobInput, JobRecord, JobSnapshot, JobState,
    ReportedStatus,
};
use crate::queue::{JobQueue, QueueEmpty};
use crate::store::{JobStore, RecordHandle};
use crate::types::{ClaimId, JobId, Metadata, Timestamp, WorkerId};

/// Default maximum number of pending jobs.
pub const DEFAULT_MAX_QUEUE: usize = 1000;

/// Prefix of dispatcher-minted claim ids.
pub const CLAIM_ID_PREFIX: &str = "c-";

// ---------------------------------------------------------------------------
// Public DTOs
// ---------------------------------------------------------------------------

/// Outcome of a successful enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueueReceipt {
    pub job_id: JobId,
    /// Queue length right after the append.
    pub queue_length: usize,
    /// 1-based position of the new job (equal to `queue_length` at enqueue).
    pub position: usize,
}

/// A worker's progress or terminal report against its claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub claim_id: ClaimId,
    pub worker_id: WorkerId,
    pub status: ReportedStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl StatusReport {
    pub fn new(
        claim_id: impl Into<ClaimId>,
        worker_id: impl Into<WorkerId>,
        status: ReportedStatus,
    ) -> Self {
        Self {
            claim_id: claim_id.into(),
            worker_id: worker_id.into(),
            status,
            logs: None,
            metadata: None,
        }
    }

    pub fn with_logs(mut self, logs: impl Into<String>) -> Self {
        self.logs = Some(logs.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Point-in-time counters for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatcherStats {
    pub queued: usize,
    pub active_claims: usize,
    pub closed_claims: usize,
    pub jobs: usize,
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Claim {
    worker_id: WorkerId,
    job_id: JobId,
    closed_at: Option<Timestamp>,
    record: RecordHandle,
}

type ClaimHandle = Arc<Mutex<Claim>>;

#[derive(Debug, Default)]
struct DispatchState {
    queue: JobQueue,
    store: JobStore,
    active_claims: HashMap<ClaimId, ClaimHandle>,
    /// Claims that received a terminal report, with the worker that held them.
    closed_claims: HashMap<ClaimId, WorkerId>,
    next_claim_seq: u64,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Queue, Claim Coordinator, and Status Tracker behind one owner.
///
/// Designed to be shared as `Arc<Dispatcher>`. No method performs I/O or
/// waits on anything but its own short critical sections.
#[derive(Debug)]
pub struct Dispatcher {
    state: Mutex<DispatchState>,
    feed: StatusFeed,
    max_queue: usize,
}

impl Dispatcher {
    /// Create a dispatcher that accepts at most `max_queue` pending jobs.
    pub fn new(max_queue: usize) -> Self {
        Self {
            state: Mutex::new(DispatchState::default()),
            feed: StatusFeed::default(),
            max_queue,
        }
    }

    // -- Queue ---------------------------------------------------------------

    /// Record a new job as `pending` and append it to the queue.
    ///
    /// A missing `jobId` is replaced by a generated one. Fails with
    /// `DuplicateJob` if the id was ever seen, in any state.
    pub async fn enqueue(&self, input: JobInput) -> Result<EnqueueReceipt, CoreError> {
        let job_id = match input.job_id.as_deref() {
            None => generate_job_id(),
            Some(id) if id.trim().is_empty() => {
                return Err(CoreError::Validation("jobId must not be empty".into()));
            }
            Some(id) => id.to_string(),
        };

        let mut state = self.state.lock().await;

        if state.store.contains(&job_id) {
            tracing::warn!(job_id = %job_id, "Rejected duplicate job");
            return Err(CoreError::DuplicateJob(job_id));
        }
        if state.queue.len() >= self.max_queue {
            tracing::warn!(
                job_id = %job_id,
                capacity = self.max_queue,
                "Rejected job, queue is full",
            );
            return Err(CoreError::QueueFull {
                capacity: self.max_queue,
            });
        }

        let record = JobRecord::pending(job_id.clone(), input, Utc::now());
        let change = StatusChange::from_record(&record);
        state.store.insert(record)?;
        let queue_length = state.queue.enqueue(job_id.clone());
        self.feed.publish(change);
        drop(state);

        tracing::info!(job_id = %job_id, queue_length, "Job enqueued");

        Ok(EnqueueReceipt {
            job_id,
            queue_length,
            position: queue_length,
        })
    }

    // -- Claim Coordinator ---------------------------------------------------

    /// Hand the head of the queue to `worker_id`.
    ///
    /// Returns `Ok(None)` when nothing is pending; that is the normal idle
    /// state and callers should poll again later.
    pub async fn claim(&self, worker_id: &str) -> Result<Option<ClaimedJob>, CoreError> {
        if worker_id.trim().is_empty() {
            return Err(CoreError::Validation("workerId must not be empty".into()));
        }

        let mut state = self.state.lock().await;

        let job_id = match state.queue.dequeue_next() {
            Ok(job_id) => job_id,
            Err(QueueEmpty) => return Ok(None),
        };

        let Some(record) = state.store.get(&job_id) else {
            tracing::error!(job_id = %job_id, "Queued job has no record");
            return Err(CoreError::Internal(format!(
                "queued job {job_id} has no record"
            )));
        };

        state.next_claim_seq += 1;
        let claim_id = format!("{CLAIM_ID_PREFIX}{}", state.next_claim_seq);
        let now = Utc::now();

        let mut job = record.lock().await;
        if job.state != JobState::Pending {
            tracing::error!(job_id = %job_id, state = %job.state, "Queued job is not pending");
            return Err(CoreError::Internal(format!(
                "queued job {job_id} is {}",
                job.state
            )));
        }
        job.state = JobState::Claimed;
        job.claim_id = Some(claim_id.clone());
        job.worker_id = Some(worker_id.to_string());
        job.claimed_at = Some(now);
        job.updated_at = now;

        let claimed = ClaimedJob {
            job: job.input.clone(),
            claim_id: claim_id.clone(),
        };
        self.feed.publish(StatusChange::from_record(&job));
        drop(job);

        let claim = Claim {
            worker_id: worker_id.to_string(),
            job_id: job_id.clone(),
            closed_at: None,
            record,
        };
        state
            .active_claims
            .insert(claim_id.clone(), Arc::new(Mutex::new(claim)));
        let queue_length = state.queue.len();
        drop(state);

        tracing::info!(
            job_id = %job_id,
            claim_id = %claim_id,
            worker_id,
            queue_length,
            "Job claimed",
        );

        Ok(Some(claimed))
    }

    // -- Status Tracker ------------------------------------------------------

    /// Apply a worker report to the job behind `report.claim_id`.
    ///
    /// Reports against one claim are applied in arrival order. A terminal
    /// status closes the claim; anything reported after that fails with
    /// `ClaimClosed`.
    pub async fn report_status(&self, report: StatusReport) -> Result<JobSnapshot, CoreError> {
        let StatusReport {
            claim_id,
            worker_id,
            status,
            logs,
            metadata,
        } = report;

        let handle = {
            let state = self.state.lock().await;
            match state.active_claims.get(&claim_id) {
                Some(handle) => Arc::clone(handle),
                None => {
                    return Err(match state.closed_claims.get(&claim_id) {
                        Some(owner) if *owner != worker_id => CoreError::ClaimMismatch(claim_id),
                        Some(_) => CoreError::ClaimClosed(claim_id),
                        None => CoreError::UnknownClaim(claim_id),
                    });
                }
            }
        };

        let mut claim = handle.lock().await;
        if claim.worker_id != worker_id {
            tracing::warn!(
                claim_id = %claim_id,
                worker_id = %worker_id,
                "Status report from a worker that does not hold the claim",
            );
            return Err(CoreError::ClaimMismatch(claim_id));
        }
        if claim.closed_at.is_some() {
            return Err(CoreError::ClaimClosed(claim_id));
        }

        let next = JobState::from(status);
        let now = Utc::now();
        let record = Arc::clone(&claim.record);
        let mut job = record.lock().await;

        if !job.state.can_transition_to(next) {
            tracing::error!(
                job_id = %claim.job_id,
                claim_id = %claim_id,
                from = %job.state,
                to = %next,
                "Open claim points at a job in an unexpected state",
            );
            return Err(CoreError::Internal(format!(
                "job {} cannot move from {} to {next}",
                claim.job_id, job.state
            )));
        }

        job.state = next;
        if let Some(logs) = logs {
            job.logs = Some(logs);
        }
        if let Some(metadata) = metadata {
            merge_metadata(&mut job.metadata, metadata);
        }
        job.updated_at = now;
        if next.is_terminal() {
            job.finished_at = Some(now);
            claim.closed_at = Some(now);
        }

        let snapshot = job.snapshot();
        self.feed.publish(StatusChange::from_record(&job));
        drop(job);
        drop(claim);

        if next.is_terminal() {
            let mut state = self.state.lock().await;
            state.active_claims.remove(&claim_id);
            state.closed_claims.insert(claim_id.clone(), worker_id.clone());
            tracing::info!(
                job_id = %snapshot.job_id,
                claim_id = %claim_id,
                worker_id = %worker_id,
                state = %next,
                "Claim closed",
            );
        } else {
            tracing::debug!(
                job_id = %snapshot.job_id,
                claim_id = %claim_id,
                worker_id = %worker_id,
                "Progress reported",
            );
        }

        Ok(snapshot)
    }

    // -- Reads ---------------------------------------------------------------

    /// Current view of one job, with its 1-based queue position while it is
    /// still pending.
    pub async fn job(&self, job_id: &str) -> Option<JobSnapshot> {
        let (record, position) = {
            let state = self.state.lock().await;
            (state.store.get(job_id)?, state.queue.position(job_id))
        };
        let mut snapshot = record.lock().await.snapshot();
        if snapshot.state == JobState::Pending {
            snapshot.queue_position = position;
        }
        Some(snapshot)
    }

    pub async fn stats(&self) -> DispatcherStats {
        let state = self.state.lock().await;
        DispatcherStats {
            queued: state.queue.len(),
            active_claims: state.active_claims.len(),
            closed_claims: state.closed_claims.len(),
            jobs: state.store.len(),
        }
    }

    // -- Notifications -------------------------------------------------------

    /// Every status change of every job.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.feed.subscribe()
    }

    /// Status changes of one job, ending at its terminal state.
    ///
    /// Subscribes before looking the job up, so no change applied after this
    /// call is missed. A job not yet enqueued is watched by id only.
    pub async fn watch(&self, job_id: impl Into<JobId>) -> JobWatch {
        let job_id = job_id.into();
        let watch = self.feed.watch(job_id.clone());
        let record = self.state.lock().await.store.get(&job_id);
        match record {
            Some(record) => watch.with_record(record),
            None => watch,
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUEUE)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
