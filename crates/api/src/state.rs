use std::sync::Arc;

use codimir_core::auth::AuthGate;
use codimir_core::dispatcher::Dispatcher;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// The single dispatcher owning the queue, claims, and job records.
    pub dispatcher: Arc<Dispatcher>,
    /// Shared-secret gates for submission, callback, and claim.
    pub auth: Arc<AuthGate>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Build a fresh dispatcher and auth gate from configuration.
    pub fn new(config: ServerConfig) -> Self {
        let dispatcher = Dispatcher::new(config.max_queue);
        let auth = AuthGate::new(
            config.secrets.submission.as_deref(),
            config.secrets.callback.as_deref(),
            config.secrets.worker.as_deref(),
        );
        Self {
            dispatcher: Arc::new(dispatcher),
            auth: Arc::new(auth),
            config: Arc::new(config),
        }
    }
}
