//! FIFO of pending job ids.
//!
//! The queue holds identifiers only; full records live in the
//! [`JobStore`](crate::store::JobStore). It is not synchronised on its own:
//! the [`Dispatcher`](crate::dispatcher::Dispatcher) owns it behind the same
//! lock as the claim map, which is what makes dequeue-and-claim atomic.

use std::collections::VecDeque;

use crate::types::JobId;

/// Returned by [`JobQueue::dequeue_next`] when nothing is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Queue is empty")]
pub struct QueueEmpty;

#[derive(Debug, Default)]
pub struct JobQueue {
    pending: VecDeque<JobId>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail. Returns the new queue length.
    pub fn enqueue(&mut self, job_id: JobId) -> usize {
        self.pending.push_back(job_id);
        self.pending.len()
    }

    /// Remove and return the head.
    pub fn dequeue_next(&mut self) -> Result<JobId, QueueEmpty> {
        self.pending.pop_front().ok_or(QueueEmpty)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// 1-based position of a pending job, counted from the head.
    pub fn position(&self, job_id: &str) -> Option<usize> {
        self.pending
            .iter()
            .position(|id| id == job_id)
            .map(|idx| idx + 1)
    }
}
