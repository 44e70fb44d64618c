use std::net::SocketAddr;
use std::time::Duration;

use codimir_core::auth::Gate;
use codimir_events::{CallbackDelivery, CallbackRelay};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use codimir_api::config::ServerConfig;
use codimir_api::router::build_app_router;
use codimir_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "codimir_api=debug,codimir_core=info,codimir_events=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        max_queue = config.max_queue,
        "Loaded server configuration"
    );

    // --- App state ---
    let state = AppState::new(config.clone());
    for gate in [Gate::Submission, Gate::Callback] {
        if !state.auth.is_enforced(gate) {
            tracing::warn!(gate = gate.as_str(), "No secret configured, gate is open");
        }
    }
    if !state.auth.is_enforced(Gate::Worker) {
        tracing::info!("WORKER_SECRET not set, claims are not authenticated");
    }

    // --- Callback relay ---
    let relay_cancel = CancellationToken::new();
    let delivery = CallbackDelivery::new().expect("Failed to build callback HTTP client");
    let relay = CallbackRelay::new(
        delivery,
        config.forward_callback_url.clone(),
        config.secrets.forward.clone(),
    );
    let relay_handle = tokio::spawn(relay.run(state.dispatcher.subscribe(), relay_cancel.clone()));

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting dispatcher");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    relay_cancel.cancel();
    let timeout = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(timeout, relay_handle).await.is_err() {
        tracing::warn!("Callback relay did not finish in time, pending deliveries dropped");
    } else {
        tracing::info!("Callback relay stopped");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
