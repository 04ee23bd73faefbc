//! Ingestion pipeline: parsed batches → one store transaction each.
//!
//! Every ingest carries exactly one execution id and one space; all rows
//! written by it share both. After the writes, the rollups of exactly the
//! touched entities are recomputed inside the same transaction, then the
//! commit makes everything visible at once.

mod ci_run;

pub use ci_run::{CiIngestSummary, CiJobData, CiRunData};

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use argos_core::errors::StoreError;
use argos_core::types::entity::{EntityType, OutcomeStatus, Space};
use argos_parsers::coverage::CoverageData;
use argos_parsers::lint::ParsedLint;
use argos_parsers::test_report::TestOutcome;
use argos_storage::queries::{coverage, execution_history, lint, quality};
use argos_storage::ArgosStorageEngine;

use crate::error::EngineError;
use crate::stats;

/// Wall-clock ceiling for one ingest transaction.
const INGEST_WALL_CLOCK: Duration = Duration::from_secs(600);

/// Provenance and identity for one ingest.
#[derive(Debug, Clone)]
pub struct IngestContext {
    pub execution_id: String,
    pub space: Space,
    pub timestamp: i64,
    pub metadata: BTreeMap<String, String>,
    /// Dedupe on `(entity_id, execution_id)` instead of failing. CI
    /// re-ingest uses this to converge.
    pub dedupe: bool,
}

impl IngestContext {
    /// Context for a local tool invocation.
    pub fn local(execution_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            execution_id: execution_id.into(),
            space: Space::Local,
            timestamp,
            metadata: BTreeMap::new(),
            dedupe: false,
        }
    }

    /// Context for a CI-derived ingest; duplicate outcomes are ignored.
    pub fn ci(execution_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            execution_id: execution_id.into(),
            space: Space::Ci,
            timestamp,
            metadata: BTreeMap::new(),
            dedupe: true,
        }
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    fn metadata_json(&self) -> Option<String> {
        if self.metadata.is_empty() {
            None
        } else {
            serde_json::to_string(&self.metadata).ok()
        }
    }
}

/// What one ingest wrote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestSummary {
    pub execution_id: String,
    pub rows_written: usize,
    pub entities: Vec<String>,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// The ingestion pipeline. Borrows the store; each call is one
/// transaction.
pub struct Ingestor<'a> {
    store: &'a ArgosStorageEngine,
}

impl<'a> Ingestor<'a> {
    pub fn new(store: &'a ArgosStorageEngine) -> Self {
        Self { store }
    }

    /// Ingest parsed test outcomes. Local ingests fail with `Constraint`
    /// on a duplicate execution id; CI contexts converge instead.
    pub fn ingest_test_report(
        &self,
        outcomes: &[TestOutcome],
        ctx: &IngestContext,
    ) -> Result<IngestSummary, EngineError> {
        let started = Instant::now();
        let metadata_json = ctx.metadata_json();

        let summary = self.store.ingest_transaction(|conn| {
            let mut summary = IngestSummary {
                execution_id: ctx.execution_id.clone(),
                ..IngestSummary::default()
            };

            for outcome in outcomes {
                let row = execution_history::NewExecutionHistory {
                    entity_id: outcome.node_id.clone(),
                    entity_type: EntityType::Test.as_str().to_string(),
                    execution_id: ctx.execution_id.clone(),
                    timestamp: ctx.timestamp,
                    status: outcome.outcome.as_str().to_string(),
                    duration_seconds: outcome.duration_seconds,
                    space: ctx.space.as_str().to_string(),
                    metadata_json: metadata_json.clone(),
                };
                let written = if ctx.dedupe {
                    execution_history::insert_dedupe(conn, &row)?
                } else {
                    execution_history::insert(conn, &row).map(|_| true)?
                };
                if written {
                    summary.rows_written += 1;
                }
                match outcome.outcome {
                    OutcomeStatus::Passed => summary.passed += 1,
                    OutcomeStatus::Failed => summary.failed += 1,
                    OutcomeStatus::Skipped => summary.skipped += 1,
                    OutcomeStatus::Error => summary.errors += 1,
                }
                summary.entities.push(outcome.node_id.clone());
            }

            summary.entities.sort();
            summary.entities.dedup();
            stats::recompute_entities(conn, &summary.entities)?;

            check_wall_clock(started)?;
            Ok(summary)
        })?;

        info!(
            execution_id = %ctx.execution_id,
            rows = summary.rows_written,
            "ingested test report"
        );
        Ok(summary)
    }

    /// Ingest one or more validators' parsed lint output.
    ///
    /// `scanned_files` is the full set of files the validators looked at;
    /// files without violations get PASSED history rows. Callers that only
    /// have tool output (CI artifacts) pass an empty slice and only the
    /// violating files are recorded.
    pub fn ingest_lint(
        &self,
        parsed: &[ParsedLint],
        scanned_files: &[String],
        ctx: &IngestContext,
    ) -> Result<IngestSummary, EngineError> {
        let started = Instant::now();
        let metadata_json = ctx.metadata_json();

        let summary = self.store.ingest_transaction(|conn| {
            let mut summary = IngestSummary {
                execution_id: ctx.execution_id.clone(),
                ..IngestSummary::default()
            };
            let mut touched_pairs: Vec<(String, String)> = Vec::new();

            for batch in parsed {
                let validator = batch.summary.validator.as_str();

                // Replacing a summary replaces its violations with it, so
                // the by_code histogram stays exact under re-ingest.
                lint::delete_violations_for(conn, &ctx.execution_id, validator)?;

                let rows: Vec<lint::NewLintViolation> = batch
                    .violations
                    .iter()
                    .map(|v| lint::NewLintViolation {
                        execution_id: ctx.execution_id.clone(),
                        file_path: v.file_path.clone(),
                        line: i64::from(v.line),
                        column_num: v.column.map(i64::from),
                        severity: v.severity.as_str().to_string(),
                        code: v.code.clone(),
                        message: v.message.clone(),
                        validator: validator.to_string(),
                        timestamp: ctx.timestamp,
                        space: ctx.space.as_str().to_string(),
                    })
                    .collect();
                summary.rows_written += lint::insert_violations(conn, &rows)?;

                let by_code_json =
                    serde_json::to_string(&batch.summary.by_code).unwrap_or_else(|_| "{}".into());
                lint::upsert_summary(
                    conn,
                    &lint::NewLintSummary {
                        execution_id: ctx.execution_id.clone(),
                        timestamp: ctx.timestamp,
                        validator: validator.to_string(),
                        files_scanned: scanned_files
                            .len()
                            .max(batch.summary.files_scanned as usize)
                            as i64,
                        total_violations: batch.summary.total_violations as i64,
                        errors: batch.summary.errors as i64,
                        warnings: batch.summary.warnings as i64,
                        info: batch.summary.info as i64,
                        by_code_json,
                        space: ctx.space.as_str().to_string(),
                    },
                )?;
                summary.rows_written += 1;

                // History rows: violating files fail the check, the rest of
                // the scanned set passes.
                let mut violating: Vec<&str> =
                    batch.violations.iter().map(|v| v.file_path.as_str()).collect();
                violating.sort_unstable();
                violating.dedup();

                let mut files: Vec<(String, bool)> = violating
                    .iter()
                    .map(|f| ((*f).to_string(), true))
                    .collect();
                for scanned in scanned_files {
                    if !violating.contains(&scanned.as_str()) {
                        files.push((scanned.clone(), false));
                    }
                }

                for (file, has_violations) in &files {
                    let row = execution_history::NewExecutionHistory {
                        entity_id: file.clone(),
                        entity_type: EntityType::LintFile.as_str().to_string(),
                        execution_id: format!("{}-{}", ctx.execution_id, validator),
                        timestamp: ctx.timestamp,
                        status: if *has_violations {
                            OutcomeStatus::Failed.as_str().to_string()
                        } else {
                            OutcomeStatus::Passed.as_str().to_string()
                        },
                        duration_seconds: 0.0,
                        space: ctx.space.as_str().to_string(),
                        metadata_json: metadata_json.clone(),
                    };
                    if execution_history::insert_dedupe(conn, &row)? {
                        summary.rows_written += 1;
                    }
                    summary.entities.push(file.clone());
                    touched_pairs.push((file.clone(), validator.to_string()));
                }
            }

            for (file, validator) in &touched_pairs {
                quality::recompute_and_upsert(conn, file, validator)?;
            }

            summary.entities.sort();
            summary.entities.dedup();
            stats::recompute_entities(conn, &summary.entities)?;

            check_wall_clock(started)?;
            Ok(summary)
        })?;

        info!(
            execution_id = %ctx.execution_id,
            rows = summary.rows_written,
            validators = parsed.len(),
            "ingested lint results"
        );
        Ok(summary)
    }

    /// Ingest a parsed coverage report: one summary row plus per-file
    /// rows. Re-ingest of the same execution id replaces both.
    pub fn ingest_coverage(
        &self,
        data: &CoverageData,
        ctx: &IngestContext,
    ) -> Result<IngestSummary, EngineError> {
        let started = Instant::now();

        let summary = self.store.ingest_transaction(|conn| {
            let mut summary = IngestSummary {
                execution_id: ctx.execution_id.clone(),
                ..IngestSummary::default()
            };

            coverage::delete_history_for_execution(conn, &ctx.execution_id)?;

            let rows: Vec<coverage::NewCoverageHistory> = data
                .per_file
                .iter()
                .map(|f| coverage::NewCoverageHistory {
                    execution_id: ctx.execution_id.clone(),
                    file_path: f.file_path.clone(),
                    timestamp: ctx.timestamp,
                    total_statements: f.total_statements as i64,
                    covered_statements: f.covered_statements as i64,
                    coverage_percentage: f.coverage_percentage,
                    missing_lines_json: serde_json::to_string(&f.missing_lines)
                        .unwrap_or_else(|_| "[]".into()),
                    space: ctx.space.as_str().to_string(),
                })
                .collect();
            summary.rows_written += coverage::insert_history(conn, &rows)?;

            coverage::upsert_summary(
                conn,
                &coverage::NewCoverageSummary {
                    execution_id: ctx.execution_id.clone(),
                    timestamp: ctx.timestamp,
                    total_coverage: data.total_coverage,
                    files_analyzed: data.files_analyzed as i64,
                    total_statements: data.total_statements as i64,
                    covered_statements: data.covered_statements as i64,
                    space: ctx.space.as_str().to_string(),
                },
            )?;
            summary.rows_written += 1;
            summary.entities = data.per_file.iter().map(|f| f.file_path.clone()).collect();

            check_wall_clock(started)?;
            Ok(summary)
        })?;

        info!(
            execution_id = %ctx.execution_id,
            files = data.files_analyzed,
            total = data.total_coverage,
            "ingested coverage report"
        );
        Ok(summary)
    }

    /// Ingest an already-fetched CI run (row seeds, jobs, logs).
    pub fn ingest_ci_run(&self, data: &CiRunData) -> Result<CiIngestSummary, EngineError> {
        ci_run::ingest(self.store, data)
    }
}

fn check_wall_clock(started: Instant) -> Result<(), StoreError> {
    if started.elapsed() > INGEST_WALL_CLOCK {
        warn!("ingest exceeded wall clock, rolling back");
        return Err(StoreError::Busy);
    }
    Ok(())
}
