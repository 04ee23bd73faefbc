//! Integration tests for the ingestion pipeline, statistics, and rule
//! selection over a real (in-memory) store.

use argos_core::errors::StoreError;
use argos_core::types::entity::{EntityType, OutcomeStatus};
use argos_core::types::rules::{ExecutionRule, RuleCriteria};
use argos_engine::ingest::{CiJobData, CiRunData, IngestContext, Ingestor};
use argos_engine::{rules, stats, EngineError};
use argos_parsers::lint::Validator;
use argos_parsers::test_report::TestOutcome;
use argos_parsers::{coverage, test_report};
use argos_storage::queries::ci::{NewCiWorkflowJob, NewCiWorkflowRun};
use argos_storage::ArgosStorageEngine;

fn outcome(node_id: &str, status: OutcomeStatus, duration: f64) -> TestOutcome {
    TestOutcome {
        node_id: node_id.to_string(),
        outcome: status,
        duration_seconds: duration,
    }
}

fn test_rule(criteria: RuleCriteria, window: u32, threshold: f64) -> ExecutionRule {
    ExecutionRule {
        name: "r".to_string(),
        enabled: true,
        criteria,
        window,
        threshold,
        groups: vec![],
        executor: serde_json::Value::Null,
        entity_type: EntityType::Test,
    }
}

// ---------------------------------------------------------------------------
// Test-report ingest (scenario: local run with one failure)
// ---------------------------------------------------------------------------

#[test]
fn local_run_with_one_failure() {
    let store = ArgosStorageEngine::open_in_memory().unwrap();
    let ingestor = Ingestor::new(&store);

    let outcomes = vec![
        outcome("a/t::t1", OutcomeStatus::Passed, 0.10),
        outcome("a/t::t2", OutcomeStatus::Failed, 0.20),
        outcome("a/t::t3", OutcomeStatus::Skipped, 0.00),
    ];
    let ctx = IngestContext::local("local-20260101-000000", 1_000);
    let summary = ingestor.ingest_test_report(&outcomes, &ctx).unwrap();

    assert_eq!(summary.rows_written, 3);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(store.count_execution_history().unwrap(), 3);

    let t2 = store.get_entity_statistics("a/t::t2").unwrap().unwrap();
    assert_eq!(t2.total_runs, 1);
    assert_eq!(t2.failed, 1);
    assert!((t2.failure_rate - 1.0).abs() < 1e-9);

    let flaky = store
        .with_reader(|conn| stats::flaky(conn, 0.5, 1, None))
        .unwrap();
    let ids: Vec<&str> = flaky.iter().map(|f| f.entity_id.as_str()).collect();
    assert_eq!(ids, vec!["a/t::t2"]);
}

#[test]
fn duplicate_local_ingest_is_rejected_atomically() {
    let store = ArgosStorageEngine::open_in_memory().unwrap();
    let ingestor = Ingestor::new(&store);
    let ctx = IngestContext::local("local-1", 1_000);

    let first = vec![outcome("a/t::t1", OutcomeStatus::Passed, 0.1)];
    ingestor.ingest_test_report(&first, &ctx).unwrap();

    // Second batch shares the execution id; nothing from it may land.
    let second = vec![
        outcome("a/t::t9", OutcomeStatus::Passed, 0.1),
        outcome("a/t::t1", OutcomeStatus::Failed, 0.1),
    ];
    let err = ingestor.ingest_test_report(&second, &ctx).unwrap_err();
    assert!(matches!(err, EngineError::Store(StoreError::Constraint { .. })));

    assert_eq!(store.count_execution_history().unwrap(), 1);
    assert!(store.get_entity_statistics("a/t::t9").unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Lint ingest (scenario: flake8 two-line output)
// ---------------------------------------------------------------------------

#[test]
fn flake8_ingest_matches_scenario() {
    let store = ArgosStorageEngine::open_in_memory().unwrap();
    let ingestor = Ingestor::new(&store);

    let text = "src/x.py:10:5: E501 line too long\nsrc/x.py:11:1: W503 break before operator\n";
    let parsed = Validator::Flake8.parse_output(text).unwrap();
    let ctx = IngestContext::local("local-1", 1_000);
    ingestor.ingest_lint(&[parsed], &[], &ctx).unwrap();

    let summary = store.get_lint_summary("local-1", "flake8").unwrap().unwrap();
    assert_eq!(summary.total_violations, 2);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.warnings, 1);
    assert_eq!(summary.info, 0);
    assert_eq!(summary.files_scanned, 1);
    let by_code: std::collections::BTreeMap<String, i64> =
        serde_json::from_str(&summary.by_code_json).unwrap();
    assert_eq!(by_code.get("E501"), Some(&1));
    assert_eq!(by_code.get("W503"), Some(&1));

    let violations = store
        .get_lint_violations(&argos_storage::queries::lint::LintViolationFilter {
            execution_id: Some("local-1".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(violations.len(), 2);
    assert_eq!(violations[0].severity, "ERROR");
    assert_eq!(violations[1].severity, "WARNING");

    // Quality rollup follows the ingest.
    let metrics = store
        .get_code_quality_metrics("src/x.py", "flake8")
        .unwrap()
        .unwrap();
    assert_eq!(metrics.total_violations, 2);
    assert_eq!(metrics.total_scans, 1);
    assert_eq!(metrics.most_common_code.as_deref(), Some("E501"));
}

#[test]
fn lint_summary_equals_violation_histogram() {
    let store = ArgosStorageEngine::open_in_memory().unwrap();
    let ingestor = Ingestor::new(&store);

    let text = "a.py:1:1: E501 x\na.py:2:1: E501 x\nb.py:3:1: W291 y\nb.py:4:1: D100 z\n";
    let parsed = Validator::Flake8.parse_output(text).unwrap();
    let ctx = IngestContext::local("local-1", 1_000);
    ingestor.ingest_lint(&[parsed], &[], &ctx).unwrap();

    let summary = store.get_lint_summary("local-1", "flake8").unwrap().unwrap();
    let by_code: std::collections::BTreeMap<String, i64> =
        serde_json::from_str(&summary.by_code_json).unwrap();

    let violations = store
        .get_lint_violations(&argos_storage::queries::lint::LintViolationFilter {
            execution_id: Some("local-1".to_string()),
            ..Default::default()
        })
        .unwrap();

    let mut histogram: std::collections::BTreeMap<String, i64> = Default::default();
    for v in &violations {
        *histogram.entry(v.code.clone()).or_insert(0) += 1;
    }
    assert_eq!(by_code, histogram);
    assert_eq!(
        summary.errors + summary.warnings + summary.info,
        summary.total_violations
    );
}

// ---------------------------------------------------------------------------
// Coverage ingest
// ---------------------------------------------------------------------------

const COVERAGE_XML: &str = r#"<?xml version="1.0" ?>
<coverage>
  <packages><package><classes>
    <class name="x" filename="src/x.py"><lines>
      <line number="1" hits="1"/><line number="2" hits="1"/><line number="3" hits="0"/>
    </lines></class>
  </classes></package></packages>
</coverage>"#;

#[test]
fn coverage_ingest_keeps_summary_invariant() {
    let store = ArgosStorageEngine::open_in_memory().unwrap();
    let ingestor = Ingestor::new(&store);

    let data = coverage::parse(COVERAGE_XML).unwrap();
    let ctx = IngestContext::local("local-1", 1_000);
    ingestor.ingest_coverage(&data, &ctx).unwrap();

    let summary = store.get_coverage_summary("local-1").unwrap().unwrap();
    assert!(summary.total_statements > 0);
    let recomputed =
        summary.covered_statements as f64 / summary.total_statements as f64 * 100.0;
    assert!((summary.total_coverage - recomputed).abs() < 0.005);

    let rows = store.coverage_history_for_execution("local-1").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].file_path, "src/x.py");
    let missing: Vec<u32> = serde_json::from_str(&rows[0].missing_lines_json).unwrap();
    assert_eq!(missing, vec![3]);
}

// ---------------------------------------------------------------------------
// Statistics reproducibility
// ---------------------------------------------------------------------------

#[test]
fn stored_statistics_match_independent_fold() {
    let store = ArgosStorageEngine::open_in_memory().unwrap();
    let ingestor = Ingestor::new(&store);

    let statuses = [
        OutcomeStatus::Passed,
        OutcomeStatus::Failed,
        OutcomeStatus::Passed,
        OutcomeStatus::Error,
        OutcomeStatus::Skipped,
    ];
    for (i, status) in statuses.iter().enumerate() {
        let ctx = IngestContext::local(format!("local-{i}"), 1_000 + i as i64);
        ingestor
            .ingest_test_report(&[outcome("t.py::x", *status, 0.1 * (i as f64 + 1.0))], &ctx)
            .unwrap();
    }

    let stored = store.get_entity_statistics("t.py::x").unwrap().unwrap();

    // Independent pass over the same rows.
    let rows = store.recent_history_for_entity("t.py::x", None, None).unwrap();
    let recomputed = stats::compute("t.py::x", &rows, None);

    assert_eq!(stored.total_runs, recomputed.total_runs);
    assert_eq!(stored.passed, recomputed.passed);
    assert_eq!(stored.failed, recomputed.failed);
    assert_eq!(stored.skipped, recomputed.skipped);
    assert!((stored.failure_rate - recomputed.failure_rate).abs() < 1e-9);
    assert!((stored.avg_duration - recomputed.avg_duration).abs() < 1e-9);
    assert_eq!(stored.last_run, recomputed.last_run);
    assert_eq!(stored.last_failure, recomputed.last_failure);

    // ERROR counts as a failure: 2 of 5.
    assert_eq!(stored.failed, 2);
}

#[test]
fn space_scoped_statistics_exclude_the_other_space() {
    let store = ArgosStorageEngine::open_in_memory().unwrap();
    let ingestor = Ingestor::new(&store);

    ingestor
        .ingest_test_report(
            &[outcome("t.py::x", OutcomeStatus::Passed, 0.1)],
            &IngestContext::local("local-1", 1_000),
        )
        .unwrap();
    ingestor
        .ingest_test_report(
            &[outcome("t.py::x", OutcomeStatus::Failed, 0.1)],
            &IngestContext::ci("ci-42-7", 2_000),
        )
        .unwrap();

    let local_rows = store
        .recent_history_for_entity("t.py::x", Some("local"), None)
        .unwrap();
    let local_stats = stats::compute("t.py::x", &local_rows, None);
    assert_eq!(local_stats.total_runs, 1);
    assert_eq!(local_stats.failed, 0);

    let ci_rows = store
        .recent_history_for_entity("t.py::x", Some("ci"), None)
        .unwrap();
    let ci_stats = stats::compute("t.py::x", &ci_rows, None);
    assert_eq!(ci_stats.total_runs, 1);
    assert_eq!(ci_stats.failed, 1);
}

// ---------------------------------------------------------------------------
// CI run ingest idempotency
// ---------------------------------------------------------------------------

fn ci_run_data() -> CiRunData {
    let log = "FAILED tests/net.py::test_tcp - ConnectionError\n== 3 passed, 1 failed in 2.0s ==\n";
    CiRunData {
        run: NewCiWorkflowRun {
            run_id: 42,
            workflow_name: "CI".to_string(),
            branch: "main".to_string(),
            commit_sha: "abc".to_string(),
            status: "completed".to_string(),
            conclusion: Some("failure".to_string()),
            started_at: Some(1_000),
            duration_seconds: Some(120.0),
            run_number: 7,
        },
        jobs: vec![
            CiJobData {
                job: NewCiWorkflowJob {
                    job_id: 1,
                    run_id: 42,
                    job_name: "tests (ubuntu)".to_string(),
                    status: "completed".to_string(),
                    conclusion: Some("failure".to_string()),
                    started_at: Some(1_000),
                    completed_at: Some(1_100),
                    runner_os: Some("ubuntu-latest".to_string()),
                },
                log: Some(log.to_string()),
            },
            CiJobData {
                job: NewCiWorkflowJob {
                    job_id: 2,
                    run_id: 42,
                    job_name: "lint".to_string(),
                    status: "completed".to_string(),
                    conclusion: Some("success".to_string()),
                    started_at: Some(1_000),
                    completed_at: Some(1_050),
                    runner_os: Some("ubuntu-latest".to_string()),
                },
                log: None,
            },
        ],
    }
}

#[test]
fn ci_ingest_twice_converges() {
    let store = ArgosStorageEngine::open_in_memory().unwrap();
    let ingestor = Ingestor::new(&store);

    let first = ingestor.ingest_ci_run(&ci_run_data()).unwrap();
    assert_eq!(first.jobs, 2);
    assert!(first.history_rows > 0);
    assert_eq!(first.failed_tests, 1);

    let runs_before = store.count_ci_runs().unwrap();
    let jobs_before = store.count_ci_jobs().unwrap();
    let history_before = store.count_execution_history().unwrap();

    let second = ingestor.ingest_ci_run(&ci_run_data()).unwrap();
    assert_eq!(second.history_rows, 0);

    assert_eq!(store.count_ci_runs().unwrap(), runs_before);
    assert_eq!(store.count_ci_jobs().unwrap(), jobs_before);
    assert_eq!(store.count_execution_history().unwrap(), history_before);
}

#[test]
fn ci_ingest_tags_platform_metadata() {
    let store = ArgosStorageEngine::open_in_memory().unwrap();
    Ingestor::new(&store).ingest_ci_run(&ci_run_data()).unwrap();

    let rows = store
        .recent_history_for_entity("tests/net.py::test_tcp", Some("ci"), None)
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].execution_id, "ci-42-1");
    let metadata: serde_json::Value =
        serde_json::from_str(rows[0].metadata_json.as_deref().unwrap()).unwrap();
    assert_eq!(metadata["platform"], "ubuntu-latest");
}

// ---------------------------------------------------------------------------
// Rule selection
// ---------------------------------------------------------------------------

fn seed_history(store: &ArgosStorageEngine, entity: &str, statuses: &[OutcomeStatus]) {
    let ingestor = Ingestor::new(store);
    // statuses are oldest first here; timestamps make the last element the
    // most recent row.
    for (i, status) in statuses.iter().enumerate() {
        let ctx = IngestContext::local(format!("local-{entity}-{i}"), 1_000 + i as i64);
        ingestor
            .ingest_test_report(&[outcome(entity, *status, 0.1)], &ctx)
            .unwrap();
    }
}

#[test]
fn failed_in_last_window_selects_recent_failures() {
    let store = ArgosStorageEngine::open_in_memory().unwrap();
    // Most recent first: P P F P P -> oldest first: P P F P P reversed.
    seed_history(
        &store,
        "t.py::e",
        &[
            OutcomeStatus::Passed,
            OutcomeStatus::Passed,
            OutcomeStatus::Failed,
            OutcomeStatus::Passed,
            OutcomeStatus::Passed,
        ],
    );

    // Window 3 covers the failure at position 3-from-the-end.
    let selection = rules::select(&store, &test_rule(RuleCriteria::FailedInLast, 3, 0.0), &[])
        .unwrap();
    assert_eq!(selection.entities, vec!["t.py::e"]);

    // Window 2 only sees the two most recent passes.
    let selection = rules::select(&store, &test_rule(RuleCriteria::FailedInLast, 2, 0.0), &[])
        .unwrap();
    assert!(selection.entities.is_empty());
}

#[test]
fn failure_rate_orders_by_rate_then_runs() {
    let store = ArgosStorageEngine::open_in_memory().unwrap();
    seed_history(&store, "t.py::half", &[OutcomeStatus::Failed, OutcomeStatus::Passed]);
    seed_history(
        &store,
        "t.py::always",
        &[OutcomeStatus::Failed, OutcomeStatus::Failed],
    );
    seed_history(&store, "t.py::clean", &[OutcomeStatus::Passed, OutcomeStatus::Passed]);

    let selection =
        rules::select(&store, &test_rule(RuleCriteria::FailureRate, 10, 0.5), &[]).unwrap();
    assert_eq!(selection.entities, vec!["t.py::always", "t.py::half"]);
}

#[test]
fn changed_files_expands_placeholder() {
    let store = ArgosStorageEngine::open_in_memory().unwrap();
    seed_history(&store, "tests/api.py::t1", &[OutcomeStatus::Passed]);
    seed_history(&store, "tests/db.py::t2", &[OutcomeStatus::Passed]);

    let mut rule = test_rule(RuleCriteria::ChangedFiles, 1, 0.0);
    rule.groups = vec![argos_core::types::rules::CHANGED_FILES_PLACEHOLDER.to_string()];
    let selection =
        rules::select(&store, &rule, &["tests/api.py".to_string()]).unwrap();
    assert_eq!(selection.entities, vec!["tests/api.py::t1"]);
}

#[test]
fn marker_rules_forward_executor_filters() {
    let store = ArgosStorageEngine::open_in_memory().unwrap();
    let mut rule = test_rule(RuleCriteria::Marker, 1, 0.0);
    rule.executor = serde_json::json!({"marker": "slow"});
    let selection = rules::select(&store, &rule, &[]).unwrap();
    assert!(selection.entities.is_empty());
    assert_eq!(selection.marker.as_deref(), Some("slow"));
    assert!(!selection.is_empty());
}

#[test]
fn selection_is_pure_for_fixed_state() {
    let store = ArgosStorageEngine::open_in_memory().unwrap();
    seed_history(&store, "t.py::a", &[OutcomeStatus::Failed]);
    seed_history(&store, "t.py::b", &[OutcomeStatus::Passed]);

    let rule = test_rule(RuleCriteria::FailedInLast, 5, 0.0);
    let first = rules::select(&store, &rule, &[]).unwrap();
    let second = rules::select(&store, &rule, &[]).unwrap();
    let third = rules::select(&store, &rule, &[]).unwrap();
    assert_eq!(first, second);
    assert_eq!(second, third);
}

// ---------------------------------------------------------------------------
// Test report parsing feeds ingest end to end
// ---------------------------------------------------------------------------

#[test]
fn report_json_to_statistics_end_to_end() {
    let store = ArgosStorageEngine::open_in_memory().unwrap();
    let ingestor = Ingestor::new(&store);

    let report = r#"{"tests": [
        {"nodeid": "a/t.py::t1", "outcome": "passed", "call": {"duration": 0.5}},
        {"nodeid": "a/t.py::t2", "outcome": "failed", "call": {"duration": 1.5}}
    ]}"#;
    let outcomes = test_report::parse(report).unwrap();
    let ctx = IngestContext::local("local-1", 1_000);
    let summary = ingestor.ingest_test_report(&outcomes, &ctx).unwrap();
    assert_eq!(summary.rows_written, 2);

    let t2 = store.get_entity_statistics("a/t.py::t2").unwrap().unwrap();
    assert!((t2.avg_duration - 1.5).abs() < 1e-9);
}
