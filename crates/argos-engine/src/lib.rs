//! # argos-engine
//!
//! The behavioral core: the ingestion pipeline (one transaction per
//! ingest), the statistics calculator, the rule engine and selection
//! planner, the rule-driven execution state machine, and the subprocess
//! adapters for the test runner and lint validators.

pub mod error;
pub mod execution;
pub mod ingest;
pub mod rules;
pub mod runner;
pub mod stats;

pub use error::EngineError;
pub use execution::{ExecutionStage, ExecutionSummary, ProgressEvent};
pub use ingest::{IngestContext, IngestSummary, Ingestor};
pub use rules::Selection;
