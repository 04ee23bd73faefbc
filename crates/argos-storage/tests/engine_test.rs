//! Integration tests for the storage engine: schema install, uniqueness
//! constraints, rule CRUD, CI upsert convergence, retention pruning.

use argos_core::errors::StoreError;
use argos_core::types::entity::EntityType;
use argos_core::types::rules::{ExecutionRule, RuleCriteria};
use argos_storage::queries::ci::{CiRunFilter, NewCiWorkflowJob, NewCiWorkflowRun};
use argos_storage::queries::execution_history::{self, HistoryFilter, NewExecutionHistory};
use argos_storage::queries::{coverage, lint};
use argos_storage::ArgosStorageEngine;

fn outcome_row(entity_id: &str, execution_id: &str, status: &str, ts: i64) -> NewExecutionHistory {
    NewExecutionHistory {
        entity_id: entity_id.to_string(),
        entity_type: "test".to_string(),
        execution_id: execution_id.to_string(),
        timestamp: ts,
        status: status.to_string(),
        duration_seconds: 0.1,
        space: "local".to_string(),
        metadata_json: None,
    }
}

fn rule(name: &str) -> ExecutionRule {
    ExecutionRule {
        name: name.to_string(),
        enabled: true,
        criteria: RuleCriteria::FailedInLast,
        window: 5,
        threshold: 0.0,
        groups: vec!["tests/**".to_string()],
        executor: serde_json::Value::Null,
        entity_type: EntityType::Test,
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[test]
fn open_installs_schema_and_reports_version() {
    let engine = ArgosStorageEngine::open_in_memory().unwrap();
    assert_eq!(engine.schema_version().unwrap(), 3);
}

#[test]
fn reopen_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.db");
    {
        let engine = ArgosStorageEngine::open(&path).unwrap();
        engine
            .insert_execution_history(&outcome_row("t.py::a", "local-1", "PASSED", 10))
            .unwrap();
        engine.checkpoint().unwrap();
    }
    let engine = ArgosStorageEngine::open(&path).unwrap();
    assert_eq!(engine.schema_version().unwrap(), 3);
    assert_eq!(engine.count_execution_history().unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Execution history
// ---------------------------------------------------------------------------

#[test]
fn duplicate_execution_id_fails_with_constraint_and_keeps_first() {
    let engine = ArgosStorageEngine::open_in_memory().unwrap();
    engine
        .insert_execution_history(&outcome_row("t.py::a", "local-1", "PASSED", 10))
        .unwrap();

    let err = engine
        .insert_execution_history(&outcome_row("t.py::a", "local-1", "FAILED", 20))
        .unwrap_err();
    assert!(matches!(err, StoreError::Constraint { .. }));

    let rows = engine
        .get_execution_history(&HistoryFilter {
            entity_id: Some("t.py::a".to_string()),
            ..HistoryFilter::default()
        })
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, "PASSED");
}

#[test]
fn same_execution_id_is_fine_across_entities() {
    let engine = ArgosStorageEngine::open_in_memory().unwrap();
    engine
        .insert_execution_history(&outcome_row("t.py::a", "local-1", "PASSED", 10))
        .unwrap();
    engine
        .insert_execution_history(&outcome_row("t.py::b", "local-1", "FAILED", 10))
        .unwrap();
    assert_eq!(engine.count_execution_history().unwrap(), 2);
}

#[test]
fn history_filter_respects_space_isolation() {
    let engine = ArgosStorageEngine::open_in_memory().unwrap();
    engine
        .insert_execution_history(&outcome_row("t.py::a", "local-1", "PASSED", 10))
        .unwrap();
    let mut ci = outcome_row("t.py::a", "ci-9-1", "FAILED", 20);
    ci.space = "ci".to_string();
    engine.insert_execution_history(&ci).unwrap();

    let local_rows = engine
        .get_execution_history(&HistoryFilter {
            space: Some("local".to_string()),
            ..HistoryFilter::default()
        })
        .unwrap();
    assert_eq!(local_rows.len(), 1);
    assert!(local_rows.iter().all(|r| r.space == "local"));

    let ci_rows = engine
        .get_execution_history(&HistoryFilter {
            space: Some("ci".to_string()),
            ..HistoryFilter::default()
        })
        .unwrap();
    assert_eq!(ci_rows.len(), 1);
    assert!(ci_rows.iter().all(|r| r.space == "ci"));
}

#[test]
fn history_orders_most_recent_first_with_id_tiebreak() {
    let engine = ArgosStorageEngine::open_in_memory().unwrap();
    engine
        .insert_execution_history(&outcome_row("t.py::a", "local-1", "PASSED", 10))
        .unwrap();
    engine
        .insert_execution_history(&outcome_row("t.py::a", "local-3", "FAILED", 30))
        .unwrap();
    engine
        .insert_execution_history(&outcome_row("t.py::a", "local-2", "PASSED", 30))
        .unwrap();

    let rows = engine
        .recent_history_for_entity("t.py::a", None, None)
        .unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r.execution_id.as_str()).collect();
    assert_eq!(ids, vec!["local-3", "local-2", "local-1"]);
}

#[test]
fn transaction_rolls_back_on_error() {
    let engine = ArgosStorageEngine::open_in_memory().unwrap();
    let result: Result<(), StoreError> = engine.ingest_transaction(|conn| {
        execution_history::insert(conn, &outcome_row("t.py::a", "local-1", "PASSED", 10))?;
        execution_history::insert(conn, &outcome_row("t.py::b", "local-1", "PASSED", 10))?;
        // Duplicate pair aborts the whole batch.
        execution_history::insert(conn, &outcome_row("t.py::a", "local-1", "FAILED", 10))?;
        Ok(())
    });
    assert!(matches!(result, Err(StoreError::Constraint { .. })));
    assert_eq!(engine.count_execution_history().unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[test]
fn rule_crud_round_trips() {
    let engine = ArgosStorageEngine::open_in_memory().unwrap();
    engine.upsert_execution_rule(&rule("recent"), 100).unwrap();

    let fetched = engine.get_execution_rule("recent").unwrap().unwrap();
    assert_eq!(fetched.criteria, RuleCriteria::FailedInLast);
    assert_eq!(fetched.window, 5);
    assert_eq!(fetched.groups, vec!["tests/**"]);

    let mut updated = rule("recent");
    updated.enabled = false;
    updated.window = 9;
    engine.upsert_execution_rule(&updated, 200).unwrap();
    let fetched = engine.get_execution_rule("recent").unwrap().unwrap();
    assert!(!fetched.enabled);
    assert_eq!(fetched.window, 9);

    assert_eq!(engine.list_execution_rules(true).unwrap().len(), 0);
    assert_eq!(engine.list_execution_rules(false).unwrap().len(), 1);

    assert!(engine.delete_execution_rule("recent").unwrap());
    assert!(!engine.delete_execution_rule("recent").unwrap());
}

// ---------------------------------------------------------------------------
// Lint summary/violation coupling
// ---------------------------------------------------------------------------

#[test]
fn lint_summary_upsert_replaces_violations() {
    let engine = ArgosStorageEngine::open_in_memory().unwrap();

    let violation = |code: &str| lint::NewLintViolation {
        execution_id: "local-1".to_string(),
        file_path: "src/x.py".to_string(),
        line: 1,
        column_num: Some(1),
        severity: "ERROR".to_string(),
        code: code.to_string(),
        message: "m".to_string(),
        validator: "flake8".to_string(),
        timestamp: 10,
        space: "local".to_string(),
    };
    let summary = |total: i64, by_code: &str| lint::NewLintSummary {
        execution_id: "local-1".to_string(),
        timestamp: 10,
        validator: "flake8".to_string(),
        files_scanned: 1,
        total_violations: total,
        errors: total,
        warnings: 0,
        info: 0,
        by_code_json: by_code.to_string(),
        space: "local".to_string(),
    };

    engine
        .ingest_transaction(|conn| {
            lint::insert_violations(conn, &[violation("E501"), violation("E502")])?;
            lint::upsert_summary(conn, &summary(2, r#"{"E501":1,"E502":1}"#))
        })
        .unwrap();
    assert_eq!(engine.count_lint_violations().unwrap(), 2);

    // Re-ingest of the same (execution_id, validator) replaces both sides.
    engine
        .ingest_transaction(|conn| {
            lint::delete_violations_for(conn, "local-1", "flake8")?;
            lint::insert_violations(conn, &[violation("E501")])?;
            lint::upsert_summary(conn, &summary(1, r#"{"E501":1}"#))
        })
        .unwrap();

    assert_eq!(engine.count_lint_violations().unwrap(), 1);
    let stored = engine.get_lint_summary("local-1", "flake8").unwrap().unwrap();
    assert_eq!(stored.total_violations, 1);
    assert_eq!(stored.by_code_json, r#"{"E501":1}"#);
}

// ---------------------------------------------------------------------------
// Coverage summaries
// ---------------------------------------------------------------------------

#[test]
fn coverage_summary_is_unique_per_execution() {
    let engine = ArgosStorageEngine::open_in_memory().unwrap();
    let summary = |covered: i64| coverage::NewCoverageSummary {
        execution_id: "local-1".to_string(),
        timestamp: 10,
        total_coverage: covered as f64,
        files_analyzed: 1,
        total_statements: 100,
        covered_statements: covered,
        space: "local".to_string(),
    };

    engine
        .ingest_transaction(|conn| coverage::upsert_summary(conn, &summary(80)))
        .unwrap();
    engine
        .ingest_transaction(|conn| coverage::upsert_summary(conn, &summary(85)))
        .unwrap();

    let rows = engine.get_coverage_summaries(None, None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].covered_statements, 85);
}

// ---------------------------------------------------------------------------
// CI upserts
// ---------------------------------------------------------------------------

#[test]
fn ci_run_and_job_upserts_converge() {
    let engine = ArgosStorageEngine::open_in_memory().unwrap();
    let run = NewCiWorkflowRun {
        run_id: 42,
        workflow_name: "CI".to_string(),
        branch: "main".to_string(),
        commit_sha: "abc".to_string(),
        status: "completed".to_string(),
        conclusion: Some("failure".to_string()),
        started_at: Some(100),
        duration_seconds: Some(300.0),
        run_number: 7,
    };
    let job = NewCiWorkflowJob {
        job_id: 7,
        run_id: 42,
        job_name: "tests".to_string(),
        status: "completed".to_string(),
        conclusion: Some("failure".to_string()),
        started_at: Some(100),
        completed_at: Some(200),
        runner_os: Some("ubuntu-latest".to_string()),
    };

    for _ in 0..2 {
        engine.upsert_ci_run(&run).unwrap();
        engine.upsert_ci_job(&job).unwrap();
    }
    assert_eq!(engine.count_ci_runs().unwrap(), 1);
    assert_eq!(engine.count_ci_jobs().unwrap(), 1);

    engine.set_ci_job_log(7, "FAILED tests/a.py::t1 - boom").unwrap();
    // Job upsert keeps the stored log.
    engine.upsert_ci_job(&job).unwrap();
    assert!(engine.ci_job_log(7).unwrap().unwrap().contains("boom"));

    let runs = engine
        .list_ci_runs(&CiRunFilter {
            branch: Some("main".to_string()),
            ..CiRunFilter::default()
        })
        .unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_number, 7);

    let jobs = engine.ci_jobs_for_run(42).unwrap();
    assert_eq!(jobs.len(), 1);
    assert!(jobs[0].has_log);
}

#[test]
fn missing_job_log_update_is_not_found() {
    let engine = ArgosStorageEngine::open_in_memory().unwrap();
    let err = engine.set_ci_job_log(999, "log").unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

// ---------------------------------------------------------------------------
// Retention
// ---------------------------------------------------------------------------

#[test]
fn prune_removes_old_rows_and_reports_touched_entities() {
    let engine = ArgosStorageEngine::open_in_memory().unwrap();
    let now = 100 * 86_400;
    engine
        .insert_execution_history(&outcome_row("t.py::old", "local-1", "PASSED", now - 95 * 86_400))
        .unwrap();
    engine
        .insert_execution_history(&outcome_row("t.py::new", "local-2", "PASSED", now - 5 * 86_400))
        .unwrap();

    let outcome = engine.prune_execution_history_older_than(90, now).unwrap();
    assert_eq!(outcome.removed, 1);
    assert_eq!(outcome.touched_entities, vec!["t.py::old".to_string()]);
    assert_eq!(engine.count_execution_history().unwrap(), 1);
}
