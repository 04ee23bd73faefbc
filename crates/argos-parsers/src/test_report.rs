//! Test-runner JSON report parser.
//!
//! Consumes the report written by a pytest-json-report-shaped plugin:
//! `tests[*].{nodeid, outcome, call.duration}`. The node id IS the entity
//! id. Unknown outcome strings map to `ERROR`.

use serde::Deserialize;

use argos_core::errors::ParseError;
use argos_core::types::entity::OutcomeStatus;

/// One test outcome from the report.
#[derive(Debug, Clone, PartialEq)]
pub struct TestOutcome {
    pub node_id: String,
    pub outcome: OutcomeStatus,
    pub duration_seconds: f64,
}

#[derive(Deserialize)]
struct RawReport {
    tests: Option<Vec<RawTest>>,
}

#[derive(Deserialize)]
struct RawTest {
    nodeid: String,
    outcome: String,
    #[serde(default)]
    call: Option<RawPhase>,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Deserialize)]
struct RawPhase {
    #[serde(default)]
    duration: Option<f64>,
}

fn map_outcome(raw: &str) -> OutcomeStatus {
    match raw {
        "passed" => OutcomeStatus::Passed,
        "failed" => OutcomeStatus::Failed,
        "skipped" => OutcomeStatus::Skipped,
        _ => OutcomeStatus::Error,
    }
}

/// Parse a runner JSON report into per-test outcomes.
///
/// Durations prefer `call.duration` and fall back to the top-level
/// `duration`; a test with neither gets 0.0. Negative durations are
/// clamped to 0.
pub fn parse(input: &str) -> Result<Vec<TestOutcome>, ParseError> {
    let report: RawReport = serde_json::from_str(input).map_err(|e| ParseError::Syntax {
        line: e.line(),
        message: e.to_string(),
    })?;

    let tests = report.tests.ok_or_else(|| ParseError::UnknownFormat {
        message: "report has no 'tests' array".to_string(),
    })?;

    Ok(tests
        .into_iter()
        .map(|t| {
            let duration = t
                .call
                .as_ref()
                .and_then(|c| c.duration)
                .or(t.duration)
                .unwrap_or(0.0)
                .max(0.0);
            TestOutcome {
                outcome: map_outcome(&t.outcome),
                node_id: t.nodeid,
                duration_seconds: duration,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_report() {
        let input = r#"{
            "tests": [
                {"nodeid": "a/t.py::t1", "outcome": "passed", "call": {"duration": 0.10}},
                {"nodeid": "a/t.py::t2", "outcome": "failed", "call": {"duration": 0.20}},
                {"nodeid": "a/t.py::t3", "outcome": "skipped", "call": {"duration": 0.00}}
            ]
        }"#;
        let outcomes = parse(input).unwrap();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].outcome, OutcomeStatus::Passed);
        assert_eq!(outcomes[1].outcome, OutcomeStatus::Failed);
        assert!((outcomes[1].duration_seconds - 0.20).abs() < 1e-9);
        assert_eq!(outcomes[2].outcome, OutcomeStatus::Skipped);
    }

    #[test]
    fn unknown_outcome_maps_to_error() {
        let input = r#"{"tests": [{"nodeid": "t.py::x", "outcome": "xfailed"}]}"#;
        let outcomes = parse(input).unwrap();
        assert_eq!(outcomes[0].outcome, OutcomeStatus::Error);
        assert_eq!(outcomes[0].duration_seconds, 0.0);
    }

    #[test]
    fn top_level_duration_is_fallback() {
        let input = r#"{"tests": [{"nodeid": "t.py::x", "outcome": "passed", "duration": 1.5}]}"#;
        let outcomes = parse(input).unwrap();
        assert!((outcomes[0].duration_seconds - 1.5).abs() < 1e-9);
    }

    #[test]
    fn malformed_json_is_syntax_error() {
        let err = parse("{not json").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
    }

    #[test]
    fn missing_tests_array_is_unknown_format() {
        let err = parse(r#"{"summary": {}}"#).unwrap_err();
        assert!(matches!(err, ParseError::UnknownFormat { .. }));
    }
}
