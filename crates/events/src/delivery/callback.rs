//! Callback delivery with exponential-backoff retry.
//!
//! [`CallbackDelivery`] sends a JSON-encoded [`CallbackPayload`] to an
//! external URL via HTTP POST. Failed attempts are retried up to three times
//! with exponential backoff (1 s, 2 s, 4 s).

use std::time::Duration;

use codimir_core::feed::StatusChange;
use codimir_core::job::JobState;
use codimir_core::types::{ClaimId, JobId, Metadata, Timestamp, WorkerId};
use serde::{Deserialize, Serialize};

/// Default retry delays (exponential backoff: 1s, 2s, 4s).
const DEFAULT_RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the relay's forward secret to the receiving application.
pub const CALLBACK_SECRET_HEADER: &str = "x-callback-secret";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for callback delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Callback returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Body POSTed to a job's callback URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    pub job_id: JobId,
    pub status: JobState,
    pub claim_id: Option<ClaimId>,
    pub worker_id: Option<WorkerId>,
    pub logs: Option<String>,
    pub metadata: Metadata,
    pub timestamp: Timestamp,
}

impl From<&StatusChange> for CallbackPayload {
    fn from(change: &StatusChange) -> Self {
        Self {
            job_id: change.job_id.clone(),
            status: change.state,
            claim_id: change.claim_id.clone(),
            worker_id: change.worker_id.clone(),
            logs: change.logs.clone(),
            metadata: change.metadata.clone(),
            timestamp: change.at,
        }
    }
}

// ---------------------------------------------------------------------------
// CallbackDelivery
// ---------------------------------------------------------------------------

/// Delivers status payloads to external callback endpoints.
#[derive(Debug, Clone)]
pub struct CallbackDelivery {
    client: reqwest::Client,
    retry_delays: Vec<Duration>,
}

impl CallbackDelivery {
    /// Create a delivery service with a pre-configured HTTP client.
    pub fn new() -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            retry_delays: DEFAULT_RETRY_DELAYS.to_vec(),
        })
    }

    /// Replace the backoff schedule. One retry is made per entry.
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    /// Deliver a payload to a callback URL with retry.
    ///
    /// Returns `Ok(())` on the first successful attempt.
    pub async fn deliver(
        &self,
        url: &str,
        payload: &CallbackPayload,
        secret: Option<&str>,
    ) -> Result<(), DeliveryError> {
        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            match self.try_send(url, payload, secret).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url,
                        job_id = %payload.job_id,
                        error = %e,
                        "Callback delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(*delay).await;
                }
            }
        }

        // Final attempt after the last backoff.
        self.try_send(url, payload, secret).await.inspect_err(|e| {
            tracing::error!(
                url,
                job_id = %payload.job_id,
                error = %e,
                "Callback delivery failed after all retries"
            );
        })
    }

    /// Execute a single POST request and check the response status.
    async fn try_send(
        &self,
        url: &str,
        payload: &CallbackPayload,
        secret: Option<&str>,
    ) -> Result<(), DeliveryError> {
        let mut request = self.client.post(url).json(payload);
        if let Some(secret) = secret {
            request = request.header(CALLBACK_SECRET_HEADER, secret);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(DeliveryError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use codimir_core::job::{JobInput, JobRecord, TaskKind};

    use super::*;

    fn payload() -> CallbackPayload {
        let record =
            JobRecord::pending("demo-1".into(), JobInput::new(TaskKind::Agent), chrono::Utc::now());
        CallbackPayload::from(&StatusChange::from_record(&record))
    }

    /// Serve a hook that fails `failures` times before answering 200.
    async fn flaky_hook(failures: usize) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let app = Router::new().route(
            "/hook",
            post(move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < failures {
                        StatusCode::INTERNAL_SERVER_ERROR
                    } else {
                        StatusCode::OK
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/hook"), hits)
    }

    #[test]
    fn new_does_not_panic() {
        let _delivery = CallbackDelivery::new().unwrap();
    }

    #[test]
    fn delivery_error_display_http_status() {
        let err = DeliveryError::HttpStatus(502);
        assert_eq!(err.to_string(), "Callback returned HTTP 502");
    }

    #[test]
    fn payload_uses_wire_names() {
        let value = serde_json::to_value(payload()).unwrap();
        assert_eq!(value["jobId"], "demo-1");
        assert_eq!(value["status"], "pending");
        assert!(value.get("timestamp").is_some());
    }

    #[tokio::test]
    async fn retries_until_success() {
        let (url, hits) = flaky_hook(2).await;
        let delivery = CallbackDelivery::new()
            .unwrap()
            .with_retry_delays(vec![Duration::from_millis(10); 3]);

        delivery.deliver(&url, &payload(), None).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_last_retry() {
        let (url, hits) = flaky_hook(usize::MAX).await;
        let delivery = CallbackDelivery::new()
            .unwrap()
            .with_retry_delays(vec![Duration::from_millis(5); 2]);

        let err = delivery.deliver(&url, &payload(), None).await.unwrap_err();
        assert!(matches!(err, DeliveryError::HttpStatus(500)));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
