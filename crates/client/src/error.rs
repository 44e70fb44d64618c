/// Errors returned by [`DispatcherClient`](crate::DispatcherClient).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The job was rejected locally before any request was sent.
    #[error("Invalid job: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// The configured base URL cannot carry a path.
    #[error("Invalid dispatcher URL: {0}")]
    InvalidUrl(String),

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The dispatcher answered with an error body.
    #[error("Dispatcher error ({status} {code}): {message}")]
    Api {
        status: u16,
        /// Stable error code, e.g. `DUPLICATE_JOB` or `CLAIM_CLOSED`.
        code: String,
        message: String,
    },

    /// A success response did not have the expected shape.
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// The dispatcher's error code, when the failure came from the server.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}
