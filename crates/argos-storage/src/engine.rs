//! `ArgosStorageEngine`: unified storage engine over the single history
//! database.
//!
//! Wraps `DatabaseManager` (read/write routing). All reads go through
//! `with_reader()`, all writes through `with_writer()` or one ingest
//! transaction. This is the single owner of both; no code outside this
//! crate should touch a raw `&Connection`.

use std::path::Path;

use rusqlite::Connection;

use argos_core::errors::StoreError;
use argos_core::types::rules::ExecutionRule;

use crate::connection::DatabaseManager;
use crate::migrations;
use crate::queries::{
    ci::{CiRunFilter, CiWorkflowJobRecord, CiWorkflowRunRecord, NewCiWorkflowJob, NewCiWorkflowRun},
    coverage::{CoverageHistoryFilter, CoverageHistoryRecord, CoverageSummaryRecord},
    execution_history::{ExecutionHistoryRecord, HistoryFilter, NewExecutionHistory},
    lint::{LintSummaryFilter, LintSummaryRecord, LintViolationFilter, LintViolationRecord},
    quality::CodeQualityMetricsRecord,
    statistics::EntityStatisticsRecord,
};
use crate::{queries, retention};

/// The unified Argos storage engine.
pub struct ArgosStorageEngine {
    db: DatabaseManager,
}

impl ArgosStorageEngine {
    /// Open a file-backed storage engine at the given path.
    /// Runs migrations and applies pragmas.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            db: DatabaseManager::open(path)?,
        })
    }

    /// Open an in-memory storage engine (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            db: DatabaseManager::open_in_memory()?,
        })
    }

    /// Database file path (None for in-memory).
    pub fn path(&self) -> Option<&Path> {
        self.db.path()
    }

    /// Current schema version.
    pub fn schema_version(&self) -> Result<u32, StoreError> {
        self.db.with_reader(migrations::current_version)
    }

    /// Writers currently waiting on the write lock (health endpoint).
    pub fn writers_queued(&self) -> usize {
        self.db.writers_queued()
    }

    /// WAL checkpoint delegation. Call before teardown; connections must
    /// be dropped before the database file is unlinked.
    pub fn checkpoint(&self) -> Result<(), StoreError> {
        self.db.checkpoint()
    }

    /// Raw read access: for analytics not covered by a typed method.
    pub fn with_reader<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        self.db.with_reader(f)
    }

    /// Run `f` inside one write transaction: the ingest bracket. Commits
    /// on `Ok`, rolls back on `Err`.
    pub fn ingest_transaction<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        self.db.transaction(f)
    }

    // ── execution history ──

    pub fn insert_execution_history(&self, row: &NewExecutionHistory) -> Result<i64, StoreError> {
        self.db.with_writer(|conn| queries::execution_history::insert(conn, row))
    }

    pub fn get_execution_history(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Vec<ExecutionHistoryRecord>, StoreError> {
        self.db.with_reader(|conn| queries::execution_history::query(conn, filter))
    }

    pub fn recent_history_for_entity(
        &self,
        entity_id: &str,
        space: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<ExecutionHistoryRecord>, StoreError> {
        self.db.with_reader(|conn| {
            queries::execution_history::recent_for_entity(conn, entity_id, space, limit)
        })
    }

    pub fn distinct_entities(
        &self,
        entity_type: &str,
        space: Option<&str>,
    ) -> Result<Vec<String>, StoreError> {
        self.db.with_reader(|conn| {
            queries::execution_history::distinct_entities(conn, entity_type, space)
        })
    }

    pub fn count_execution_history(&self) -> Result<i64, StoreError> {
        self.db.with_reader(queries::execution_history::count)
    }

    // ── rules ──

    pub fn upsert_execution_rule(&self, rule: &ExecutionRule, now: i64) -> Result<(), StoreError> {
        self.db.with_writer(|conn| queries::rules::upsert(conn, rule, now))
    }

    pub fn delete_execution_rule(&self, name: &str) -> Result<bool, StoreError> {
        self.db.with_writer(|conn| queries::rules::delete(conn, name))
    }

    pub fn get_execution_rule(&self, name: &str) -> Result<Option<ExecutionRule>, StoreError> {
        self.db.with_reader(|conn| queries::rules::get(conn, name))
    }

    pub fn list_execution_rules(&self, enabled_only: bool) -> Result<Vec<ExecutionRule>, StoreError> {
        self.db.with_reader(|conn| queries::rules::list(conn, enabled_only))
    }

    // ── statistics ──

    pub fn upsert_entity_statistics(&self, row: &EntityStatisticsRecord) -> Result<(), StoreError> {
        self.db.with_writer(|conn| queries::statistics::upsert(conn, row))
    }

    pub fn get_entity_statistics(
        &self,
        entity_id: &str,
    ) -> Result<Option<EntityStatisticsRecord>, StoreError> {
        self.db.with_reader(|conn| queries::statistics::get(conn, entity_id))
    }

    pub fn list_entity_statistics(
        &self,
        entity_type: &str,
    ) -> Result<Vec<EntityStatisticsRecord>, StoreError> {
        self.db.with_reader(|conn| queries::statistics::list_by_type(conn, entity_type))
    }

    // ── lint ──

    pub fn get_lint_violations(
        &self,
        filter: &LintViolationFilter,
    ) -> Result<Vec<LintViolationRecord>, StoreError> {
        self.db.with_reader(|conn| queries::lint::query_violations(conn, filter))
    }

    pub fn get_lint_summaries(
        &self,
        filter: &LintSummaryFilter,
    ) -> Result<Vec<LintSummaryRecord>, StoreError> {
        self.db.with_reader(|conn| queries::lint::query_summaries(conn, filter))
    }

    pub fn get_lint_summary(
        &self,
        execution_id: &str,
        validator: &str,
    ) -> Result<Option<LintSummaryRecord>, StoreError> {
        self.db.with_reader(|conn| queries::lint::get_summary(conn, execution_id, validator))
    }

    pub fn latest_lint_summary_per_validator(
        &self,
        space: &str,
    ) -> Result<Vec<LintSummaryRecord>, StoreError> {
        self.db.with_reader(|conn| queries::lint::latest_summary_per_validator(conn, space))
    }

    pub fn count_lint_violations(&self) -> Result<i64, StoreError> {
        self.db.with_reader(queries::lint::count_violations)
    }

    // ── coverage ──

    pub fn get_coverage_history(
        &self,
        filter: &CoverageHistoryFilter,
    ) -> Result<Vec<CoverageHistoryRecord>, StoreError> {
        self.db.with_reader(|conn| queries::coverage::query_history(conn, filter))
    }

    pub fn coverage_history_for_execution(
        &self,
        execution_id: &str,
    ) -> Result<Vec<CoverageHistoryRecord>, StoreError> {
        self.db.with_reader(|conn| queries::coverage::history_for_execution(conn, execution_id))
    }

    pub fn get_coverage_summaries(
        &self,
        space: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<CoverageSummaryRecord>, StoreError> {
        self.db.with_reader(|conn| queries::coverage::query_summaries(conn, space, limit))
    }

    pub fn get_coverage_summary(
        &self,
        execution_id: &str,
    ) -> Result<Option<CoverageSummaryRecord>, StoreError> {
        self.db.with_reader(|conn| queries::coverage::get_summary(conn, execution_id))
    }

    // ── code quality metrics ──

    pub fn upsert_code_quality_metrics(
        &self,
        file_path: &str,
        validator: &str,
    ) -> Result<(), StoreError> {
        self.db.with_writer(|conn| {
            queries::quality::recompute_and_upsert(conn, file_path, validator)
        })
    }

    pub fn get_code_quality_metrics(
        &self,
        file_path: &str,
        validator: &str,
    ) -> Result<Option<CodeQualityMetricsRecord>, StoreError> {
        self.db.with_reader(|conn| queries::quality::get(conn, file_path, validator))
    }

    pub fn worst_quality_files(
        &self,
        validator: &str,
        limit: usize,
    ) -> Result<Vec<CodeQualityMetricsRecord>, StoreError> {
        self.db.with_reader(|conn| queries::quality::worst_files(conn, validator, limit))
    }

    // ── CI ──

    pub fn upsert_ci_run(&self, row: &NewCiWorkflowRun) -> Result<(), StoreError> {
        self.db.with_writer(|conn| queries::ci::upsert_run(conn, row))
    }

    pub fn upsert_ci_job(&self, row: &NewCiWorkflowJob) -> Result<(), StoreError> {
        self.db.with_writer(|conn| queries::ci::upsert_job(conn, row))
    }

    pub fn list_ci_runs(&self, filter: &CiRunFilter) -> Result<Vec<CiWorkflowRunRecord>, StoreError> {
        self.db.with_reader(|conn| queries::ci::list_runs(conn, filter))
    }

    pub fn get_ci_run(&self, run_id: i64) -> Result<Option<CiWorkflowRunRecord>, StoreError> {
        self.db.with_reader(|conn| queries::ci::get_run(conn, run_id))
    }

    pub fn ci_jobs_for_run(&self, run_id: i64) -> Result<Vec<CiWorkflowJobRecord>, StoreError> {
        self.db.with_reader(|conn| queries::ci::jobs_for_run(conn, run_id))
    }

    pub fn get_ci_job(&self, job_id: i64) -> Result<Option<CiWorkflowJobRecord>, StoreError> {
        self.db.with_reader(|conn| queries::ci::get_job(conn, job_id))
    }

    pub fn ci_job_log(&self, job_id: i64) -> Result<Option<String>, StoreError> {
        self.db.with_reader(|conn| queries::ci::job_log(conn, job_id))
    }

    pub fn set_ci_job_log(&self, job_id: i64, log: &str) -> Result<(), StoreError> {
        self.db.with_writer(|conn| queries::ci::set_job_log(conn, job_id, log))
    }

    pub fn set_ci_job_test_results(
        &self,
        job_id: i64,
        results_json: &str,
    ) -> Result<(), StoreError> {
        self.db.with_writer(|conn| queries::ci::set_job_test_results(conn, job_id, results_json))
    }

    pub fn count_ci_runs(&self) -> Result<i64, StoreError> {
        self.db.with_reader(queries::ci::count_runs)
    }

    pub fn count_ci_jobs(&self) -> Result<i64, StoreError> {
        self.db.with_reader(queries::ci::count_jobs)
    }

    // ── retention ──

    /// Prune execution history older than `days`. Returns the removed row
    /// count and the entity ids whose rollups need recomputing.
    pub fn prune_execution_history_older_than(
        &self,
        days: u32,
        now: i64,
    ) -> Result<retention::PruneOutcome, StoreError> {
        let cutoff = now - i64::from(days) * 86_400;
        self.db.transaction(|conn| retention::prune(conn, cutoff))
    }
}
