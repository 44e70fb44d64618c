//! Job model: the submitted body, lifecycle states, and the record held by
//! the Job Record Store.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::{ClaimId, JobId, Metadata, Timestamp, WorkerId};

/// Prefix for job ids minted by the dispatcher when the caller omits one.
pub const GENERATED_JOB_ID_PREFIX: &str = "disp-";

// ---------------------------------------------------------------------------
// Submitted body
// ---------------------------------------------------------------------------

/// The closed set of task kinds a worker knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Agent,
    Script,
    Custom,
}

/// Commit identity passed through to workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GitUser {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
}

/// Body of an enqueue request, returned verbatim (plus `claimId`) to the
/// worker that claims the job.
///
/// Field bounds are declared with `validator`; the HTTP binding and the
/// client both run them before a job reaches the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JobInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 128))]
    pub job_id: Option<JobId>,
    pub task: TaskKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub base: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(length(max = 500))]
    pub changes: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub git_user: Option<GitUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl JobInput {
    /// Minimal body with only the required `task` field set.
    pub fn new(task: TaskKind) -> Self {
        Self {
            job_id: None,
            task,
            instructions: None,
            repo: None,
            branch: None,
            base: None,
            changes: Vec::new(),
            callback_url: None,
            git_user: None,
            github_token: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<JobId>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Mint a job id for a submission that did not carry one.
pub fn generate_job_id() -> JobId {
    format!("{GENERATED_JOB_ID_PREFIX}{}", uuid::Uuid::new_v4())
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Job-level lifecycle state.
///
/// `pending -> claimed -> running -> (succeeded | failed)`; `claimed` may
/// also go straight to a terminal state. Nothing moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Claimed,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Claimed => "claimed",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    /// Whether the state machine permits `self -> next`.
    ///
    /// `running -> running` is allowed and acts as a progress heartbeat.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Claimed)
                | (Claimed, Running)
                | (Claimed, Succeeded)
                | (Claimed, Failed)
                | (Running, Running)
                | (Running, Succeeded)
                | (Running, Failed)
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status a worker may report against its claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportedStatus {
    Running,
    Succeeded,
    Failed,
}

impl From<ReportedStatus> for JobState {
    fn from(value: ReportedStatus) -> Self {
        match value {
            ReportedStatus::Running => JobState::Running,
            ReportedStatus::Succeeded => JobState::Succeeded,
            ReportedStatus::Failed => JobState::Failed,
        }
    }
}

/// Shallow-merge `incoming` into `target`: incoming keys overwrite, all
/// other existing keys are kept.
pub fn merge_metadata(target: &mut Metadata, incoming: Metadata) {
    for (key, value) in incoming {
        target.insert(key, value);
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Canonical state of one job inside the Job Record Store.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: JobId,
    /// The body as submitted, with `job_id` filled in. Never mutated.
    pub input: JobInput,
    pub state: JobState,
    pub claim_id: Option<ClaimId>,
    pub worker_id: Option<WorkerId>,
    pub logs: Option<String>,
    /// Current metadata: the submitted map plus every merged report.
    pub metadata: Metadata,
    pub enqueued_at: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl JobRecord {
    /// A fresh `pending` record. `input.job_id` is overwritten with `job_id`.
    pub fn pending(job_id: JobId, mut input: JobInput, now: Timestamp) -> Self {
        input.job_id = Some(job_id.clone());
        let metadata = input.metadata.clone();
        Self {
            job_id,
            input,
            state: JobState::Pending,
            claim_id: None,
            worker_id: None,
            logs: None,
            metadata,
            enqueued_at: now,
            claimed_at: None,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.job_id.clone(),
            task: self.input.task,
            state: self.state,
            claim_id: self.claim_id.clone(),
            worker_id: self.worker_id.clone(),
            logs: self.logs.clone(),
            metadata: self.metadata.clone(),
            enqueued_at: self.enqueued_at,
            claimed_at: self.claimed_at,
            updated_at: self.updated_at,
            finished_at: self.finished_at,
            queue_position: None,
        }
    }
}

/// Read-only view of a job record, safe to hand out of the store.
///
/// Omits the submitted body so credentials such as `githubToken` only ever
/// travel to the claiming worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub task: TaskKind,
    pub state: JobState,
    pub claim_id: Option<ClaimId>,
    pub worker_id: Option<WorkerId>,
    pub logs: Option<String>,
    pub metadata: Metadata,
    pub enqueued_at: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    /// 1-based place in the queue; only set on lookups of a pending job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<usize>,
}

/// Payload handed to the worker that won a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimedJob {
    #[serde(flatten)]
    pub job: JobInput,
    pub claim_id: ClaimId,
}

impl ClaimedJob {
    /// The claimed job's id. Always present once a job has been enqueued.
    pub fn job_id(&self) -> &str {
        self.job.job_id.as_deref().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
