//! HTTP client for the Codimir dispatcher.
//!
//! Wraps the four wire operations (`/enqueue`, `/claim`, `/cb`, `/health`)
//! plus job lookup, for submitters and workers written in Rust.

pub mod client;
pub mod config;
pub mod error;

pub use client::{DispatcherClient, EnqueueOutcome, HealthStatus, ReportOutcome};
pub use config::ClientConfig;
pub use error::ClientError;
