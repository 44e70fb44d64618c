//! Job Record Store: the canonical state of every submitted job.
//!
//! Each record sits behind its own async mutex so that status reports for
//! different claims mutate records in parallel. The map itself is owned by
//! the dispatcher's state lock.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::CoreError;
use crate::job::JobRecord;
use crate::types::JobId;

/// Shared handle to one job record.
pub type RecordHandle = Arc<Mutex<JobRecord>>;

#[derive(Debug, Default)]
pub struct JobStore {
    records: HashMap<JobId, RecordHandle>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record, rejecting ids seen before in any state.
    pub fn insert(&mut self, record: JobRecord) -> Result<RecordHandle, CoreError> {
        if self.records.contains_key(&record.job_id) {
            return Err(CoreError::DuplicateJob(record.job_id));
        }
        let job_id = record.job_id.clone();
        let handle = Arc::new(Mutex::new(record));
        self.records.insert(job_id, Arc::clone(&handle));
        Ok(handle)
    }

    pub fn get(&self, job_id: &str) -> Option<RecordHandle> {
        self.records.get(job_id).cloned()
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.records.contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
