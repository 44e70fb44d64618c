#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use codimir_api::config::{SecretsConfig, ServerConfig};
use codimir_api::router::build_app_router;
use codimir_api::state::AppState;

pub const SUBMISSION_SECRET: &str = "submit-secret";
pub const CALLBACK_SECRET: &str = "callback-secret";
pub const WORKER_SECRET: &str = "worker-secret";

/// Build a test `ServerConfig` with safe defaults and every gate open.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        max_queue: 1000,
        forward_callback_url: None,
        secrets: SecretsConfig::default(),
    }
}

/// [`test_config`] with all three secrets configured.
pub fn secured_config() -> ServerConfig {
    ServerConfig {
        secrets: SecretsConfig {
            submission: Some(SUBMISSION_SECRET.into()),
            callback: Some(CALLBACK_SECRET.into()),
            worker: Some(WORKER_SECRET.into()),
            forward: None,
        },
        ..test_config()
    }
}

/// Build the full application router, with the same middleware stack as
/// production, over a fresh dispatcher.
pub fn build_test_app(config: ServerConfig) -> Router {
    let state = AppState::new(config.clone());
    build_app_router(state, &config)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    get_with_headers(app, uri, &[]).await
}

pub async fn get_with_headers(app: Router, uri: &str, headers: &[(&str, &str)]) -> Response<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    post_json_with_headers(app, uri, body, &[]).await
}

pub async fn post_json_with_headers(
    app: Router,
    uri: &str,
    body: Value,
    headers: &[(&str, &str)],
) -> Response<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    app.oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
