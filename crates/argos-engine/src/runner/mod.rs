//! Subprocess adapters: the test runner and the lint validators.

mod lint_runner;
mod test_runner;

pub use lint_runner::{run_validator, LintRunOutput};
pub use test_runner::{RunArtifacts, TestRunnerOptions};

pub use test_runner::run as run_tests;
