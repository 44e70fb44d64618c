//! REST client for the dispatcher's HTTP endpoints.

use codimir_core::dispatcher::StatusReport;
use codimir_core::job::{ClaimedJob, JobInput, JobSnapshot, JobState};
use codimir_core::types::JobId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::ClientConfig;
use crate::error::ClientError;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Result of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueOutcome {
    pub job_id: JobId,
    pub queue_length: usize,
    pub position: usize,
}

/// Result of an accepted status report.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOutcome {
    pub job_id: JobId,
    pub state: JobState,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub ok: bool,
    pub status: String,
    pub version: String,
    pub queued: usize,
    pub active_claims: usize,
    pub jobs: usize,
}

#[derive(Deserialize)]
struct ClaimBody {
    job: Option<ClaimedJob>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClaimRequest<'a> {
    worker_id: &'a str,
}

#[derive(Deserialize)]
struct DataBody<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

// ---------------------------------------------------------------------------
// DispatcherClient
// ---------------------------------------------------------------------------

/// HTTP client for one dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl DispatcherClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(client: reqwest::Client, config: ClientConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Submit a job. The job is validated locally first; an invalid job
    /// never reaches the network.
    pub async fn enqueue(&self, job: &JobInput) -> Result<EnqueueOutcome, ClientError> {
        job.validate()?;

        let mut request = self.client.post(self.url("/enqueue")).json(job);
        if let Some(secret) = &self.config.submission_secret {
            request = request.bearer_auth(secret);
        }
        let outcome: EnqueueOutcome = Self::parse_response(request.send().await?).await?;

        tracing::debug!(
            job_id = %outcome.job_id,
            queue_length = outcome.queue_length,
            "Job submitted to dispatcher"
        );
        Ok(outcome)
    }

    /// Claim the oldest pending job, or `None` if the queue is empty.
    pub async fn claim(&self, worker_id: &str) -> Result<Option<ClaimedJob>, ClientError> {
        let mut request = self
            .client
            .post(self.url("/claim"))
            .json(&ClaimRequest { worker_id });
        if let Some(secret) = &self.config.worker_secret {
            request = request.header("x-worker-secret", secret);
        }
        let body: ClaimBody = Self::parse_response(request.send().await?).await?;
        Ok(body.job)
    }

    /// Report progress or a final outcome against a claim.
    pub async fn report_status(&self, report: &StatusReport) -> Result<ReportOutcome, ClientError> {
        let mut request = self.client.post(self.url("/cb")).json(report);
        if let Some(secret) = &self.config.callback_secret {
            request = request.header("x-callback-secret", secret);
        }
        Self::parse_response(request.send().await?).await
    }

    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let response = self.client.get(self.url("/health")).send().await?;
        Self::parse_response(response).await
    }

    /// Current state of one job.
    pub async fn job(&self, job_id: &str) -> Result<JobSnapshot, ClientError> {
        let mut request = self.client.get(self.job_url(job_id)?);
        if let Some(secret) = &self.config.submission_secret {
            request = request.bearer_auth(secret);
        }
        let body: DataBody<JobSnapshot> = Self::parse_response(request.send().await?).await?;
        Ok(body.data)
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// `{base}/jobs/{job_id}` with the id percent-encoded as one path segment.
    fn job_url(&self, job_id: &str) -> Result<reqwest::Url, ClientError> {
        let invalid = || ClientError::InvalidUrl(self.config.base_url.clone());
        let mut url = reqwest::Url::parse(&self.config.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(["jobs", job_id]);
        Ok(url)
    }

    /// Decode a success body, or turn an error body into [`ClientError::Api`].
    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let (code, message) = match serde_json::from_slice::<ErrorBody>(&bytes) {
                Ok(body) => (body.code, body.error),
                Err(_) => (
                    "HTTP_ERROR".to_string(),
                    String::from_utf8_lossy(&bytes).into_owned(),
                ),
            };
            return Err(ClientError::Api {
                status: status.as_u16(),
                code,
                message,
            });
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}
