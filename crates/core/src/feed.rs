//! Status change notifications.
//!
//! The dispatcher publishes a [`StatusChange`] for every lifecycle step on
//! a `tokio::sync::broadcast` channel. Consumers either take the raw stream
//! via [`StatusFeed::subscribe`] or follow one job with a [`JobWatch`].

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::{JobRecord, JobState};
use crate::store::RecordHandle;
use crate::types::{ClaimId, JobId, Metadata, Timestamp, WorkerId};

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// One applied lifecycle step of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub job_id: JobId,
    pub state: JobState,
    pub claim_id: Option<ClaimId>,
    pub worker_id: Option<WorkerId>,
    pub logs: Option<String>,
    pub metadata: Metadata,
    /// Forwarding target submitted with the job, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    pub at: Timestamp,
}

impl StatusChange {
    /// Capture the current state of a record.
    pub fn from_record(record: &JobRecord) -> Self {
        Self {
            job_id: record.job_id.clone(),
            state: record.state,
            claim_id: record.claim_id.clone(),
            worker_id: record.worker_id.clone(),
            logs: record.logs.clone(),
            metadata: record.metadata.clone(),
            callback_url: record.input.callback_url.clone(),
            at: record.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// StatusFeed
// ---------------------------------------------------------------------------

/// Fan-out channel of [`StatusChange`]s.
///
/// Publishing never blocks. A subscriber that falls more than the channel
/// capacity behind loses the oldest changes and observes a lag.
pub struct StatusFeed {
    sender: broadcast::Sender<StatusChange>,
}

impl StatusFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, change: StatusChange) {
        // Zero receivers is fine.
        let _ = self.sender.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.sender.subscribe()
    }

    /// Follow a single job.
    pub fn watch(&self, job_id: impl Into<JobId>) -> JobWatch {
        JobWatch {
            job_id: job_id.into(),
            receiver: self.sender.subscribe(),
            record: None,
            finished: false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for StatusFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for StatusFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusFeed")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// JobWatch
// ---------------------------------------------------------------------------

/// Subscription to the changes of one job.
///
/// Yields changes in the order they were applied and ends after the job
/// reaches a terminal state or the feed closes. A watch that knows the job's
/// record re-reads it after a lag, so a skipped terminal change still ends
/// the watch.
pub struct JobWatch {
    job_id: JobId,
    receiver: broadcast::Receiver<StatusChange>,
    record: Option<RecordHandle>,
    finished: bool,
}

impl JobWatch {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Attach the watched job's record for recovery after a lag.
    pub fn with_record(mut self, record: RecordHandle) -> Self {
        self.record = Some(record);
        self
    }

    /// Wait for the next change of the watched job.
    pub async fn next(&mut self) -> Option<StatusChange> {
        if self.finished {
            return None;
        }
        loop {
            match self.receiver.recv().await {
                Ok(change) if change.job_id == self.job_id => {
                    if change.state.is_terminal() {
                        self.finished = true;
                    }
                    return Some(change);
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(job_id = %self.job_id, skipped, "Job watch lagged");
                    if let Some(change) = self.terminal_from_record().await {
                        self.finished = true;
                        return Some(change);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.finished = true;
                    return None;
                }
            }
        }
    }

    async fn terminal_from_record(&self) -> Option<StatusChange> {
        let record = self.record.as_ref()?.lock().await;
        record
            .state
            .is_terminal()
            .then(|| StatusChange::from_record(&record))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
