//! # argos-ci
//!
//! Narrow client over a GitHub-Actions-shaped REST surface: list workflow
//! runs and jobs, fetch job logs, download artifact archives. Bearer auth
//! is forwarded from the caller; 429/5xx responses retry with exponential
//! backoff and jitter; pagination is transparent.

pub mod artifacts;
pub mod backoff;
pub mod client;
pub mod models;

pub use client::{CiClient, CiClientConfig, RunsFilter};
pub use models::{WorkflowJob, WorkflowRun};
