//! Codimir dispatcher core.
//!
//! The in-process queue and claim protocol shared by the HTTP binding and
//! any other front end:
//!
//! - [`store`] -- the Job Record Store, canonical state of every job.
//! - [`queue`] -- FIFO of pending job ids.
//! - [`dispatcher`] -- the Claim Coordinator and Status Tracker behind one
//!   owning [`Dispatcher`](dispatcher::Dispatcher).
//! - [`auth`] -- shared-secret gates for submission, callback, and claim.
//! - [`feed`] -- status change notifications for subscribers.
//!
//! Nothing in this crate performs I/O.

pub mod auth;
pub mod dispatcher;
pub mod error;
pub mod feed;
pub mod job;
pub mod queue;
pub mod store;
pub mod types;
