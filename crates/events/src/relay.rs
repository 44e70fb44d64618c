//! Forwarding of worker reports to the submitting application.
//!
//! [`CallbackRelay`] subscribes to the dispatcher's status feed and POSTs
//! every worker-reported change (`running`, `succeeded`, `failed`) to the
//! job's `callbackUrl`, or to the configured default URL when the job did
//! not carry one. Each delivery runs on its own task so a slow endpoint never
//! holds up the feed.
//!
//! The relay's secret only ever goes to the operator-configured default URL.
//! URLs chosen by submitters receive unsigned payloads.

use std::sync::Arc;

use codimir_core::feed::StatusChange;
use codimir_core::job::JobState;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::delivery::callback::{CallbackDelivery, CallbackPayload};

/// Background service forwarding status changes to callback URLs.
pub struct CallbackRelay {
    delivery: Arc<CallbackDelivery>,
    default_url: Option<String>,
    secret: Option<String>,
    tracker: TaskTracker,
}

impl CallbackRelay {
    /// Create a relay.
    ///
    /// `default_url` is used for jobs submitted without a `callbackUrl`;
    /// `secret` is sent as the `x-callback-secret` header on deliveries to
    /// `default_url` only.
    pub fn new(
        delivery: CallbackDelivery,
        default_url: Option<String>,
        secret: Option<String>,
    ) -> Self {
        Self {
            delivery: Arc::new(delivery),
            default_url: default_url.filter(|u| !u.is_empty()),
            secret: secret.filter(|s| !s.is_empty()),
            tracker: TaskTracker::new(),
        }
    }

    /// Where a change should be delivered, if anywhere.
    ///
    /// Only worker reports are forwarded; `pending` and `claimed` are the
    /// dispatcher's own bookkeeping.
    pub fn target_for(&self, change: &StatusChange) -> Option<String> {
        match change.state {
            JobState::Pending | JobState::Claimed => None,
            JobState::Running | JobState::Succeeded | JobState::Failed => change
                .callback_url
                .clone()
                .filter(|u| !u.is_empty())
                .or_else(|| self.default_url.clone()),
        }
    }

    /// The secret to send along with a delivery to `url`, if any.
    pub fn secret_for(&self, url: &str) -> Option<&str> {
        match &self.default_url {
            Some(default_url) if default_url == url => self.secret.as_deref(),
            _ => None,
        }
    }

    /// Run the relay loop.
    ///
    /// Exits when `cancel` fires or the feed closes (the dispatcher was
    /// dropped), then waits for in-flight deliveries to finish.
    pub async fn run(
        self,
        mut receiver: broadcast::Receiver<StatusChange>,
        cancel: CancellationToken,
    ) {
        tracing::info!(
            default_url = self.default_url.as_deref().unwrap_or("<none>"),
            "Callback relay started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Callback relay shutting down");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(change) => self.forward(&change),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            skipped = n,
                            "Callback relay lagged, some status changes were not forwarded"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Status feed closed, callback relay shutting down");
                        break;
                    }
                }
            }
        }

        self.tracker.close();
        self.tracker.wait().await;
    }

    fn forward(&self, change: &StatusChange) {
        let Some(url) = self.target_for(change) else {
            return;
        };

        let delivery = Arc::clone(&self.delivery);
        let secret = self.secret_for(&url).map(str::to_string);
        let payload = CallbackPayload::from(change);
        self.tracker.spawn(async move {
            if delivery
                .deliver(&url, &payload, secret.as_deref())
                .await
                .is_ok()
            {
                tracing::debug!(
                    job_id = %payload.job_id,
                    status = %payload.status,
                    "Callback delivered"
                );
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use codimir_core::dispatcher::{Dispatcher, StatusReport};
    use codimir_core::job::{JobInput, JobRecord, ReportedStatus, TaskKind};
    use tokio::sync::Mutex;

    use super::*;

    type Received = Arc<Mutex<Vec<(Option<String>, CallbackPayload)>>>;

    async fn recording_hook() -> (String, Received) {
        let received: Received = Arc::default();
        let app = Router::new()
            .route(
                "/hook",
                post(
                    |State(received): State<Received>,
                     headers: HeaderMap,
                     Json(payload): Json<CallbackPayload>| async move {
                        let secret = headers
                            .get("x-callback-secret")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        received.lock().await.push((secret, payload));
                    },
                ),
            )
            .with_state(Arc::clone(&received));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/hook"), received)
    }

    fn relay(default_url: Option<&str>, secret: Option<&str>) -> CallbackRelay {
        CallbackRelay::new(
            CallbackDelivery::new()
                .unwrap()
                .with_retry_delays(vec![Duration::from_millis(10)]),
            default_url.map(str::to_string),
            secret.map(str::to_string),
        )
    }

    fn change(state: JobState, callback_url: Option<&str>) -> StatusChange {
        let mut input = JobInput::new(TaskKind::Agent);
        input.callback_url = callback_url.map(str::to_string);
        let mut record = JobRecord::pending("demo-1".into(), input, chrono::Utc::now());
        record.state = state;
        StatusChange::from_record(&record)
    }

    #[test]
    fn dispatcher_bookkeeping_is_not_forwarded() {
        let relay = relay(Some("http://default/cb"), None);
        assert_eq!(relay.target_for(&change(JobState::Pending, None)), None);
        assert_eq!(relay.target_for(&change(JobState::Claimed, None)), None);
    }

    #[test]
    fn job_callback_url_wins_over_default() {
        let relay = relay(Some("http://default/cb"), None);
        assert_eq!(
            relay.target_for(&change(JobState::Running, Some("http://job/cb"))),
            Some("http://job/cb".to_string())
        );
        assert_eq!(
            relay.target_for(&change(JobState::Failed, None)),
            Some("http://default/cb".to_string())
        );
    }

    #[test]
    fn secret_only_goes_to_the_default_url() {
        let relay = relay(Some("http://default/cb"), Some("cb-secret"));
        assert_eq!(relay.secret_for("http://default/cb"), Some("cb-secret"));
        assert_eq!(relay.secret_for("http://job/cb"), None);
    }

    #[test]
    fn no_target_without_any_url() {
        let relay = relay(Some(""), None);
        assert_eq!(relay.target_for(&change(JobState::Succeeded, None)), None);
    }

    #[tokio::test]
    async fn forwards_worker_reports_with_secret() {
        let (url, received) = recording_hook().await;
        let dispatcher = Dispatcher::default();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            relay(Some(url.as_str()), Some("cb-secret"))
                .run(dispatcher.subscribe(), cancel.clone()),
        );

        dispatcher
            .enqueue(JobInput::new(TaskKind::Agent).with_job_id("demo-1"))
            .await
            .unwrap();
        let claimed = dispatcher.claim("w-1").await.unwrap().unwrap();
        dispatcher
            .report_status(StatusReport::new(
                claimed.claim_id.clone(),
                "w-1",
                ReportedStatus::Succeeded,
            ))
            .await
            .unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while received.lock().await.is_empty() {
            assert!(tokio::time::Instant::now() < deadline, "callback never arrived");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        cancel.cancel();
        handle.await.unwrap();

        let received = received.lock().await;
        assert_eq!(received.len(), 1);
        let (secret, payload) = &received[0];
        assert_eq!(secret.as_deref(), Some("cb-secret"));
        assert_eq!(payload.job_id, "demo-1");
        assert_eq!(payload.status, JobState::Succeeded);
        assert_eq!(payload.claim_id.as_deref(), Some(claimed.claim_id.as_str()));
    }

    #[tokio::test]
    async fn submitter_callback_url_never_receives_the_secret() {
        let (url, received) = recording_hook().await;
        let dispatcher = Dispatcher::default();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            relay(Some("http://127.0.0.1:9/default"), Some("cb-secret"))
                .run(dispatcher.subscribe(), cancel.clone()),
        );

        let mut input = JobInput::new(TaskKind::Agent).with_job_id("own-hook");
        input.callback_url = Some(url);
        dispatcher.enqueue(input).await.unwrap();
        let claimed = dispatcher.claim("w-1").await.unwrap().unwrap();
        dispatcher
            .report_status(StatusReport::new(
                claimed.claim_id,
                "w-1",
                ReportedStatus::Failed,
            ))
            .await
            .unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while received.lock().await.is_empty() {
            assert!(tokio::time::Instant::now() < deadline, "callback never arrived");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        cancel.cancel();
        handle.await.unwrap();

        let received = received.lock().await;
        assert_eq!(received.len(), 1);
        let (secret, payload) = &received[0];
        assert_eq!(secret, &None);
        assert_eq!(payload.job_id, "own-hook");
        assert_eq!(payload.status, JobState::Failed);
    }

    #[tokio::test]
    async fn stops_when_feed_closes() {
        let dispatcher = Dispatcher::default();
        let receiver = dispatcher.subscribe();
        drop(dispatcher);

        tokio::time::timeout(
            Duration::from_secs(1),
            relay(None, None).run(receiver, CancellationToken::new()),
        )
        .await
        .expect("relay should exit once the feed is closed");
    }
}
