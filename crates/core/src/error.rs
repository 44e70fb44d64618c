use crate::types::{ClaimId, JobId};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Job {0} already exists")]
    DuplicateJob(JobId),

    #[error("Queue is full ({capacity} pending jobs)")]
    QueueFull { capacity: usize },

    #[error("Unknown claim {0}")]
    UnknownClaim(ClaimId),

    #[error("Claim {0} belongs to another worker")]
    ClaimMismatch(ClaimId),

    #[error("Claim {0} is closed")]
    ClaimClosed(ClaimId),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
