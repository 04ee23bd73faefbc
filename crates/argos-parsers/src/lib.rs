//! # argos-parsers
//!
//! Pure parsers turning tool output into typed records: test-runner JSON
//! reports, lint tool stdout (flake8/black/isort-shaped), Cobertura-like
//! coverage XML, and raw CI job logs. No filesystem or network access;
//! every function is a deterministic function of its input.

pub mod ci_log;
pub mod coverage;
pub mod lint;
pub mod test_report;

pub use ci_log::{CiLogData, FailedTest, TestSummaryCounts};
pub use coverage::{CoverageData, CoverageRegression, FileCoverage};
pub use lint::{LintSummaryData, LintViolationData, ParsedLint, Validator};
pub use test_report::TestOutcome;
