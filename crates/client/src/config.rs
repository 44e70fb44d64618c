/// Client configuration.
///
/// Secrets are optional; each is sent only with the operation it guards.
#[derive(Clone, Default)]
pub struct ClientConfig {
    /// Dispatcher base URL, without a trailing slash.
    pub base_url: String,
    pub submission_secret: Option<String>,
    pub callback_secret: Option<String>,
    pub worker_secret: Option<String>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("submission_secret", &self.submission_secret.as_ref().map(|_| "<set>"))
            .field("callback_secret", &self.callback_secret.as_ref().map(|_| "<set>"))
            .field("worker_secret", &self.worker_secret.as_ref().map(|_| "<set>"))
            .finish()
    }
}

impl ClientConfig {
    /// Config for a dispatcher at `base_url` with no secrets.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Env Var             | Default                  |
    /// |---------------------|--------------------------|
    /// | `DISPATCHER_URL`    | `http://localhost:8099`  |
    /// | `SUBMISSION_SECRET` | unset                    |
    /// | `CALLBACK_SECRET`   | unset                    |
    /// | `WORKER_SECRET`     | unset                    |
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("DISPATCHER_URL").unwrap_or_else(|_| "http://localhost:8099".into());
        Self {
            submission_secret: non_empty_var("SUBMISSION_SECRET"),
            callback_secret: non_empty_var("CALLBACK_SECRET"),
            worker_secret: non_empty_var("WORKER_SECRET"),
            ..Self::new(base_url)
        }
    }

    pub fn with_submission_secret(mut self, secret: impl Into<String>) -> Self {
        self.submission_secret = Some(secret.into());
        self
    }

    pub fn with_callback_secret(mut self, secret: impl Into<String>) -> Self {
        self.callback_secret = Some(secret.into());
        self
    }

    pub fn with_worker_secret(mut self, secret: impl Into<String>) -> Self {
        self.worker_secret = Some(secret.into());
        self
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
