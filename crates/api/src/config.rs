use codimir_core::dispatcher::DEFAULT_MAX_QUEUE;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables and set the secrets.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8099`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    ///
    /// Does not apply to the SSE status stream, which stays open until the
    /// job finishes.
    pub request_timeout_secs: u64,
    /// How long to wait for in-flight callback deliveries on shutdown (default: `5`).
    pub shutdown_timeout_secs: u64,
    /// Maximum number of pending jobs (default: `1000`).
    pub max_queue: usize,
    /// Default forwarding target for jobs submitted without a `callbackUrl`.
    pub forward_callback_url: Option<String>,
    /// Shared secrets guarding submission, status reports, and claims.
    pub secrets: SecretsConfig,
}

/// Optional shared secrets. An unset secret disables its gate.
#[derive(Clone, Default)]
pub struct SecretsConfig {
    pub submission: Option<String>,
    pub callback: Option<String>,
    pub worker: Option<String>,
    /// Outbound secret sent with forwarded reports, only to
    /// `FORWARD_CALLBACK_URL`. Never shared with the inbound gates.
    pub forward: Option<String>,
}

impl std::fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn redact(secret: &Option<String>) -> &'static str {
            if secret.is_some() {
                "<set>"
            } else {
                "<unset>"
            }
        }
        f.debug_struct("SecretsConfig")
            .field("submission", &redact(&self.submission))
            .field("callback", &redact(&self.callback))
            .field("worker", &redact(&self.worker))
            .field("forward", &redact(&self.forward))
            .finish()
    }
}

impl SecretsConfig {
    /// Read `SUBMISSION_SECRET`, `CALLBACK_SECRET`, `WORKER_SECRET`, and
    /// `FORWARD_CALLBACK_SECRET`. Empty values count as unset.
    pub fn from_env() -> Self {
        Self {
            submission: non_empty_var("SUBMISSION_SECRET"),
            callback: non_empty_var("CALLBACK_SECRET"),
            worker: non_empty_var("WORKER_SECRET"),
            forward: non_empty_var("FORWARD_CALLBACK_SECRET"),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `HOST`                    | `0.0.0.0`               |
    /// | `PORT`                    | `8099`                  |
    /// | `CORS_ORIGINS`            | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`   | `5`                     |
    /// | `MAX_QUEUE`               | `1000`                  |
    /// | `FORWARD_CALLBACK_URL`    | unset                   |
    /// | `FORWARD_CALLBACK_SECRET` | unset                   |
    /// | `SUBMISSION_SECRET`       | unset                   |
    /// | `CALLBACK_SECRET`         | unset                   |
    /// | `WORKER_SECRET`           | unset                   |
    ///
    /// `ORIGINAL_CALLBACK_URL` is accepted as an alias of `FORWARD_CALLBACK_URL`.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8099".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let max_queue: usize = std::env::var("MAX_QUEUE")
            .map(|v| v.parse().expect("MAX_QUEUE must be a valid usize"))
            .unwrap_or(DEFAULT_MAX_QUEUE);

        let forward_callback_url =
            non_empty_var("FORWARD_CALLBACK_URL").or_else(|| non_empty_var("ORIGINAL_CALLBACK_URL"));

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            max_queue,
            forward_callback_url,
            secrets: SecretsConfig::from_env(),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
