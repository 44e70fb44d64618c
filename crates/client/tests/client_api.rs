//! Client tests against a real dispatcher bound to an ephemeral port.

use assert_matches::assert_matches;
use codimir_api::config::{SecretsConfig, ServerConfig};
use codimir_api::router::build_app_router;
use codimir_api::state::AppState;
use codimir_client::{ClientConfig, ClientError, DispatcherClient};
use codimir_core::dispatcher::StatusReport;
use codimir_core::job::{GitUser, JobInput, JobState, ReportedStatus, TaskKind};
use serde_json::json;

fn server_config(secrets: SecretsConfig) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        max_queue: 1000,
        forward_callback_url: None,
        secrets,
    }
}

/// Serve a fresh dispatcher and return its base URL.
async fn spawn_dispatcher(secrets: SecretsConfig) -> String {
    let config = server_config(secrets);
    let app = build_app_router(AppState::new(config.clone()), &config);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn submitter_and_worker_complete_a_job() {
    let client = DispatcherClient::new(ClientConfig::new(spawn_dispatcher(SecretsConfig::default()).await));

    let outcome = client
        .enqueue(
            &JobInput::new(TaskKind::Agent)
                .with_job_id("demo-1")
                .with_instructions("Add README"),
        )
        .await
        .unwrap();
    assert_eq!(outcome.job_id, "demo-1");
    assert_eq!(outcome.queue_length, 1);

    let claimed = client.claim("w-1").await.unwrap().expect("job should be pending");
    assert_eq!(claimed.job_id(), "demo-1");
    assert_eq!(claimed.claim_id, "c-1");
    assert_eq!(claimed.job.instructions.as_deref(), Some("Add README"));

    let running = client
        .report_status(&StatusReport::new("c-1", "w-1", ReportedStatus::Running).with_logs("working"))
        .await
        .unwrap();
    assert_eq!(running.state, JobState::Running);

    let done = client
        .report_status(&StatusReport::new("c-1", "w-1", ReportedStatus::Succeeded))
        .await
        .unwrap();
    assert_eq!(done.state, JobState::Succeeded);

    let err = client
        .report_status(&StatusReport::new("c-1", "w-1", ReportedStatus::Running))
        .await
        .unwrap_err();
    assert_matches!(err, ClientError::Api { status: 409, ref code, .. } if code == "CLAIM_CLOSED");

    let snapshot = client.job("demo-1").await.unwrap();
    assert_eq!(snapshot.state, JobState::Succeeded);
    assert_eq!(snapshot.logs.as_deref(), Some("working"));

    let health = client.health().await.unwrap();
    assert!(health.ok);
    assert_eq!(health.jobs, 1);
    assert_eq!(health.active_claims, 0);
}

#[tokio::test]
async fn empty_queue_claims_nothing() {
    let client = DispatcherClient::new(ClientConfig::new(spawn_dispatcher(SecretsConfig::default()).await));
    assert!(client.claim("w-1").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_submission_surfaces_error_code() {
    let client = DispatcherClient::new(ClientConfig::new(spawn_dispatcher(SecretsConfig::default()).await));
    let job = JobInput::new(TaskKind::Script).with_job_id("dup");

    client.enqueue(&job).await.unwrap();
    let err = client.enqueue(&job).await.unwrap_err();
    assert_eq!(err.code(), Some("DUPLICATE_JOB"));
}

#[tokio::test]
async fn invalid_job_is_rejected_before_sending() {
    // Nothing listens here; a network attempt would fail with `Request`.
    let client = DispatcherClient::new(ClientConfig::new("http://127.0.0.1:9"));

    let mut job = JobInput::new(TaskKind::Agent).with_job_id("bad-email");
    job.git_user = Some(GitUser {
        name: "Bot".into(),
        email: "not-an-email".into(),
    });
    let err = client.enqueue(&job).await.unwrap_err();
    assert_matches!(err, ClientError::Validation(_));

    let job = JobInput::new(TaskKind::Agent).with_job_id("");
    assert_matches!(client.enqueue(&job).await, Err(ClientError::Validation(_)));
}

#[tokio::test]
async fn secrets_are_sent_with_their_operations() {
    let secrets = SecretsConfig {
        submission: Some("sub".into()),
        callback: Some("cb".into()),
        worker: Some("wrk".into()),
        forward: None,
    };
    let base_url = spawn_dispatcher(secrets).await;

    let anonymous = DispatcherClient::new(ClientConfig::new(base_url.clone()));
    let err = anonymous
        .enqueue(&JobInput::new(TaskKind::Agent))
        .await
        .unwrap_err();
    assert_matches!(err, ClientError::Api { status: 401, .. });

    let client = DispatcherClient::new(
        ClientConfig::new(base_url)
            .with_submission_secret("sub")
            .with_callback_secret("cb")
            .with_worker_secret("wrk"),
    );
    let job = JobInput::new(TaskKind::Custom)
        .with_metadata(json!({"a": 1}).as_object().cloned().unwrap());
    let outcome = client.enqueue(&job).await.unwrap();
    assert!(outcome.job_id.starts_with("disp-"));

    let claimed = client.claim("w-1").await.unwrap().unwrap();
    let report = StatusReport::new(claimed.claim_id.clone(), "w-1", ReportedStatus::Failed)
        .with_metadata(json!({"b": 2}).as_object().cloned().unwrap());
    client.report_status(&report).await.unwrap();

    let snapshot = client.job(&outcome.job_id).await.unwrap();
    assert_eq!(snapshot.state, JobState::Failed);
    assert_eq!(snapshot.metadata.get("a"), Some(&json!(1)));
    assert_eq!(snapshot.metadata.get("b"), Some(&json!(2)));
}

#[tokio::test]
async fn job_lookup_escapes_reserved_characters() {
    let client = DispatcherClient::new(ClientConfig::new(spawn_dispatcher(SecretsConfig::default()).await));

    let plain = client
        .enqueue(&JobInput::new(TaskKind::Agent).with_job_id("demo"))
        .await
        .unwrap();
    assert_eq!(plain.job_id, "demo");

    for id in ["team/demo-1", "demo?1", "demo#1", "demo 1%"] {
        client
            .enqueue(&JobInput::new(TaskKind::Script).with_job_id(id))
            .await
            .unwrap();
        let snapshot = client.job(id).await.unwrap();
        assert_eq!(snapshot.job_id, id);
        assert_eq!(snapshot.task, TaskKind::Script);
    }

    let err = client.job("ghost?demo").await.unwrap_err();
    assert_matches!(err, ClientError::Api { status: 404, ref code, .. } if code == "NOT_FOUND");
}
