//! Integration tests for the comparison analytics and report assembly
//! over a seeded in-memory store.

use std::sync::Arc;

use argos_core::types::entity::OutcomeStatus;
use argos_engine::ingest::{CiJobData, CiRunData, IngestContext, Ingestor};
use argos_parsers::test_report::TestOutcome;
use argos_server::analytics;
use argos_server::reports::{self, assemble};
use argos_storage::queries::ci::{NewCiWorkflowJob, NewCiWorkflowRun};
use argos_storage::ArgosStorageEngine;

fn outcome(node_id: &str, status: OutcomeStatus) -> TestOutcome {
    TestOutcome {
        node_id: node_id.to_string(),
        outcome: status,
        duration_seconds: 0.1,
    }
}

fn ci_job(job_id: i64, name: &str, os: &str, conclusion: &str) -> NewCiWorkflowJob {
    NewCiWorkflowJob {
        job_id,
        run_id: 42,
        job_name: name.to_string(),
        status: "completed".to_string(),
        conclusion: Some(conclusion.to_string()),
        started_at: Some(2_000),
        completed_at: Some(2_100),
        runner_os: Some(os.to_string()),
    }
}

/// Local PASSED for tests/net::tcp_timeout; CI FAILED on two platforms.
fn seed_comparison_store() -> Arc<ArgosStorageEngine> {
    let store = ArgosStorageEngine::open_in_memory().unwrap();
    let ingestor = Ingestor::new(&store);

    ingestor
        .ingest_test_report(
            &[outcome("tests/net::tcp_timeout", OutcomeStatus::Passed)],
            &IngestContext::local("local-1", 1_000),
        )
        .unwrap();

    let failed_log = "FAILED tests/net::tcp_timeout - TimeoutError\n== 1 failed in 1.0s ==\n";
    let data = CiRunData {
        run: NewCiWorkflowRun {
            run_id: 42,
            workflow_name: "CI".to_string(),
            branch: "main".to_string(),
            commit_sha: "abc".to_string(),
            status: "completed".to_string(),
            conclusion: Some("failure".to_string()),
            started_at: Some(2_000),
            duration_seconds: Some(100.0),
            run_number: 7,
        },
        jobs: vec![
            CiJobData {
                job: ci_job(1, "tests (ubuntu-latest)", "ubuntu-latest", "failure"),
                log: Some(failed_log.to_string()),
            },
            CiJobData {
                job: ci_job(2, "tests (windows-latest)", "windows-latest", "failure"),
                log: Some(failed_log.to_string()),
            },
        ],
    };
    ingestor.ingest_ci_run(&data).unwrap();

    Arc::new(store)
}

// ---------------------------------------------------------------------------
// Local vs CI comparison
// ---------------------------------------------------------------------------

#[test]
fn comparison_reports_per_platform_disagreement() {
    let store = seed_comparison_store();
    let comparison =
        analytics::compare_entity(&store, "tests/net::tcp_timeout").unwrap();

    assert_eq!(comparison.local.as_deref(), Some("PASSED"));
    assert_eq!(
        comparison.ci_by_platform.get("ubuntu-latest").map(String::as_str),
        Some("FAILED")
    );
    assert_eq!(
        comparison.ci_by_platform.get("windows-latest").map(String::as_str),
        Some("FAILED")
    );
    assert!(comparison.disagreement);
}

#[test]
fn comparison_without_ci_rows_has_no_disagreement() {
    let store = ArgosStorageEngine::open_in_memory().unwrap();
    Ingestor::new(&store)
        .ingest_test_report(
            &[outcome("t.py::x", OutcomeStatus::Passed)],
            &IngestContext::local("local-1", 1_000),
        )
        .unwrap();

    let comparison = analytics::compare_entity(&store, "t.py::x").unwrap();
    assert_eq!(comparison.local.as_deref(), Some("PASSED"));
    assert!(comparison.ci_by_platform.is_empty());
    assert!(!comparison.disagreement);
}

#[test]
fn platform_failures_lists_locally_green_entities() {
    let store = seed_comparison_store();
    let failures = analytics::platform_failures(&store).unwrap();

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].entity_id, "tests/net::tcp_timeout");
    assert_eq!(
        failures[0].platforms,
        vec!["ubuntu-latest".to_string(), "windows-latest".to_string()]
    );
}

#[test]
fn platform_failures_skip_locally_failing_entities() {
    let store = seed_comparison_store();
    // A later local failure removes the entity from the list.
    Ingestor::new(&store)
        .ingest_test_report(
            &[outcome("tests/net::tcp_timeout", OutcomeStatus::Failed)],
            &IngestContext::local("local-2", 3_000),
        )
        .unwrap();

    let failures = analytics::platform_failures(&store).unwrap();
    assert!(failures.is_empty());
}

// ---------------------------------------------------------------------------
// Quality comparison
// ---------------------------------------------------------------------------

#[test]
fn quality_comparison_joins_spaces_per_validator() {
    let store = ArgosStorageEngine::open_in_memory().unwrap();
    let ingestor = Ingestor::new(&store);

    let local = argos_parsers::lint::Validator::Flake8
        .parse_output("a.py:1:1: E501 x\n")
        .unwrap();
    ingestor
        .ingest_lint(&[local], &[], &IngestContext::local("local-1", 1_000))
        .unwrap();

    let ci = argos_parsers::lint::Validator::Flake8
        .parse_output("a.py:1:1: E501 x\nb.py:2:1: W291 y\nc.py:3:1: F401 z\n")
        .unwrap();
    ingestor
        .ingest_lint(&[ci], &[], &IngestContext::ci("ci-42", 2_000))
        .unwrap();

    let deltas = analytics::quality_comparison(&store, None).unwrap();
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].validator, "flake8");
    assert_eq!(deltas[0].local_total, Some(1));
    assert_eq!(deltas[0].ci_total, Some(3));
    assert_eq!(deltas[0].delta, -2);
    assert_eq!(deltas[0].direction, "↓");
}

// ---------------------------------------------------------------------------
// Report assembly + renderer determinism
// ---------------------------------------------------------------------------

#[test]
fn test_report_assembles_and_renders_deterministically() {
    let store = seed_comparison_store();
    let input = assemble::test_report_input(&store, "demo", 0.3, 10).unwrap();
    assert!(input.total_runs > 0);

    let a = reports::render_test_html(&input);
    let b = reports::render_test_html(&input);
    assert_eq!(a, b);

    let md_a = reports::render_test_markdown(&input);
    let md_b = reports::render_test_markdown(&input);
    assert_eq!(md_a, md_b);
    assert!(md_a.contains("# Test report — demo"));
}

#[test]
fn quality_report_includes_space_comparison() {
    let store = ArgosStorageEngine::open_in_memory().unwrap();
    let ingestor = Ingestor::new(&store);
    let parsed = argos_parsers::lint::Validator::Flake8
        .parse_output("a.py:1:1: E501 x\n")
        .unwrap();
    ingestor
        .ingest_lint(&[parsed.clone()], &[], &IngestContext::local("local-1", 1_000))
        .unwrap();
    ingestor
        .ingest_lint(&[parsed], &[], &IngestContext::ci("ci-42", 2_000))
        .unwrap();

    let input = assemble::quality_report_input(&store, "demo").unwrap();
    assert_eq!(input.validators.len(), 1);
    assert!(input.comparison.is_some());

    let html = reports::render_quality_html(&input);
    assert!(html.contains("Local vs CI"));
}
