//! Rule-driven execution: the state machine that selects entities, runs
//! them, ingests the results, and streams progress.
//!
//! Stages: PENDING → SELECTING → EXECUTING → INGESTING → SUMMARIZING →
//! DONE | CANCELLED | FAILED. Cancellation is honored while executing
//! (the subprocess is killed) and before the ingest transaction starts;
//! a terminated execution commits nothing.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch, Semaphore};
use tracing::{info, warn};

use argos_core::errors::{RunnerError, StoreError};
use argos_core::ids;
use argos_core::types::entity::OutcomeStatus;
use argos_parsers::{coverage, test_report};
use argos_storage::ArgosStorageEngine;

use crate::error::EngineError;
use crate::ingest::{IngestContext, Ingestor};
use crate::rules;
use crate::runner::{self, TestRunnerOptions};

/// Execution lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStage {
    Pending,
    Selecting,
    Executing,
    Ingesting,
    Summarizing,
    Done,
    Cancelled,
    Failed,
}

impl ExecutionStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Failed)
    }
}

/// Running counts shown in progress frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecStats {
    pub ran: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// One WebSocket progress frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: ExecutionStage,
    pub percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_entity: Option<String>,
    pub stats: ExecStats,
    pub ts: i64,
}

/// Final summary of one rule-driven execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub execution_id: String,
    pub rule_name: String,
    pub stage: ExecutionStage,
    pub selected: usize,
    pub ran: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub duration_seconds: f64,
    pub coverage_percent: Option<f64>,
}

/// Everything an execution needs from its host process.
#[derive(Clone)]
pub struct ExecutionEnv {
    pub store: Arc<ArgosStorageEngine>,
    pub workdir: PathBuf,
    /// Directory for runner reports and coverage XML.
    pub report_dir: PathBuf,
    /// Runner argv override; empty = pytest default.
    pub runner_command: Vec<String>,
    /// Per-entity timeout forwarded to the runner.
    pub timeout_secs: u64,
    /// Bounded subprocess slots shared across executions.
    pub pool: Arc<Semaphore>,
}

/// One dispatch request.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub rule_name: String,
    pub execution_id: String,
    pub changed_files: Vec<String>,
    pub coverage: bool,
}

fn emit(
    progress: &broadcast::Sender<ProgressEvent>,
    stage: ExecutionStage,
    percent: u8,
    current_entity: Option<String>,
    stats: ExecStats,
) {
    let _ = progress.send(ProgressEvent {
        stage,
        percent,
        current_entity,
        stats,
        ts: ids::now_unix(),
    });
}

/// Recognize runner verbose lines of the form `node::id OUTCOME [..]`.
fn parse_progress_line(line: &str) -> Option<(String, OutcomeStatus)> {
    let mut parts = line.split_whitespace();
    let node = parts.next()?;
    if !node.contains("::") {
        return None;
    }
    let outcome = match parts.next()? {
        "PASSED" => OutcomeStatus::Passed,
        "FAILED" => OutcomeStatus::Failed,
        "SKIPPED" => OutcomeStatus::Skipped,
        "ERROR" => OutcomeStatus::Error,
        _ => return None,
    };
    Some((node.to_string(), outcome))
}

/// Drive one rule execution end to end, streaming progress frames to
/// `progress`. The caller owns the broadcast channel and the cancel
/// switch. Every outcome, including errors before the runner starts,
/// ends the stream with a terminal frame.
pub async fn run_rule_execution(
    env: ExecutionEnv,
    request: ExecutionRequest,
    progress: broadcast::Sender<ProgressEvent>,
    cancel: watch::Receiver<bool>,
) -> Result<ExecutionSummary, EngineError> {
    let result = drive(env, request, progress.clone(), cancel).await;
    if let Err(e) = &result {
        // Cancellation already sent its terminal frame; every other error
        // ends the stream with FAILED. Subscribers stop at the first
        // terminal frame, so a duplicate is never observed.
        if !matches!(e, EngineError::Runner(RunnerError::Cancelled)) {
            emit(&progress, ExecutionStage::Failed, 100, None, ExecStats::default());
        }
    }
    result
}

async fn drive(
    env: ExecutionEnv,
    request: ExecutionRequest,
    progress: broadcast::Sender<ProgressEvent>,
    cancel: watch::Receiver<bool>,
) -> Result<ExecutionSummary, EngineError> {
    let started = Instant::now();
    emit(&progress, ExecutionStage::Pending, 0, None, ExecStats::default());

    // ── SELECTING ──
    emit(&progress, ExecutionStage::Selecting, 5, None, ExecStats::default());

    let store = Arc::clone(&env.store);
    let rule_name = request.rule_name.clone();
    let changed_files = request.changed_files.clone();
    let (rule, selection) = tokio::task::spawn_blocking(move || {
        let rule = store
            .get_execution_rule(&rule_name)?
            .ok_or_else(|| EngineError::Store(StoreError::NotFound {
                what: format!("rule {rule_name}"),
            }))?;
        let selection = rules::select(&store, &rule, &changed_files)?;
        Ok::<_, EngineError>((rule, selection))
    })
    .await
    .map_err(|e| EngineError::Store(StoreError::Sqlite {
        message: format!("selection task: {e}"),
    }))??;

    info!(
        rule = %rule.name,
        entities = selection.entities.len(),
        "selection computed"
    );

    if selection.is_empty() {
        // Nothing to run: straight to DONE with an empty summary.
        emit(&progress, ExecutionStage::Done, 100, None, ExecStats::default());
        return Ok(ExecutionSummary {
            execution_id: request.execution_id,
            rule_name: rule.name,
            stage: ExecutionStage::Done,
            selected: 0,
            ran: 0,
            passed: 0,
            failed: 0,
            skipped: 0,
            errors: 0,
            duration_seconds: started.elapsed().as_secs_f64(),
            coverage_percent: None,
        });
    }

    // ── EXECUTING ──
    let permit = Arc::clone(&env.pool)
        .acquire_owned()
        .await
        .map_err(|_| EngineError::Store(StoreError::Busy))?;

    let mut options = TestRunnerOptions::new(
        env.workdir.clone(),
        env.report_dir.join(format!("{}.json", request.execution_id)),
    );
    options.command = env.runner_command.clone();
    options.timeout_secs = env.timeout_secs;
    options.marker = selection.marker.clone();
    options.pattern = selection.pattern.clone();
    if request.coverage {
        options.coverage_path =
            Some(env.report_dir.join(format!("{}-coverage.xml", request.execution_id)));
    }

    let total = selection.entities.len();
    let (line_tx, mut line_rx) = mpsc::channel::<String>(256);
    let progress_clone = progress.clone();
    let relay = tokio::spawn(async move {
        let mut stats = ExecStats::default();
        while let Some(line) = line_rx.recv().await {
            if let Some((node, outcome)) = parse_progress_line(&line) {
                stats.ran += 1;
                match outcome {
                    OutcomeStatus::Passed => stats.passed += 1,
                    OutcomeStatus::Failed | OutcomeStatus::Error => stats.failed += 1,
                    OutcomeStatus::Skipped => stats.skipped += 1,
                }
                let percent = if total > 0 {
                    10 + ((stats.ran.min(total) * 70) / total) as u8
                } else {
                    50
                };
                emit(
                    &progress_clone,
                    ExecutionStage::Executing,
                    percent,
                    Some(node),
                    stats,
                );
            }
        }
        stats
    });

    emit(&progress, ExecutionStage::Executing, 10, None, ExecStats::default());
    let run_result = runner::run_tests(
        &selection.entities,
        &options,
        Some(line_tx),
        cancel.clone(),
    )
    .await;
    drop(permit);
    let live_stats = relay.await.unwrap_or_default();

    let artifacts = match run_result {
        Ok(artifacts) => artifacts,
        Err(RunnerError::Cancelled) => {
            warn!(execution_id = %request.execution_id, "execution cancelled while running");
            emit(&progress, ExecutionStage::Cancelled, 100, None, live_stats);
            return Err(EngineError::Runner(RunnerError::Cancelled));
        }
        Err(e) => {
            emit(&progress, ExecutionStage::Failed, 100, None, live_stats);
            return Err(EngineError::Runner(e));
        }
    };

    // ── INGESTING ──
    if *cancel.borrow() {
        // Cancelled after the runner exited but before ingest: nothing is
        // committed.
        emit(&progress, ExecutionStage::Cancelled, 100, None, live_stats);
        return Err(EngineError::Runner(RunnerError::Cancelled));
    }
    emit(&progress, ExecutionStage::Ingesting, 85, None, live_stats);

    let report_text = tokio::fs::read_to_string(&artifacts.report_path)
        .await
        .map_err(|e| EngineError::Runner(RunnerError::MissingReport {
            path: format!("{}: {e}", artifacts.report_path.display()),
        }))?;
    let outcomes = test_report::parse(&report_text)?;

    let coverage_data = match &artifacts.coverage_path {
        Some(path) if path.exists() => {
            let text = tokio::fs::read_to_string(path).await.unwrap_or_default();
            match coverage::parse(&text) {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!("coverage report unusable: {e}");
                    None
                }
            }
        }
        _ => None,
    };

    let store = Arc::clone(&env.store);
    let execution_id = request.execution_id.clone();
    let rule_label = rule.name.clone();
    let coverage_for_ingest = coverage_data.clone();
    let ingest_summary = tokio::task::spawn_blocking(move || {
        let ingestor = Ingestor::new(&store);
        let ctx = IngestContext::local(execution_id, ids::now_unix())
            .with_metadata("rule", &rule_label);
        let summary = ingestor.ingest_test_report(&outcomes, &ctx)?;
        if let Some(data) = &coverage_for_ingest {
            ingestor.ingest_coverage(data, &ctx)?;
        }
        Ok::<_, EngineError>(summary)
    })
    .await
    .map_err(|e| EngineError::Store(StoreError::Sqlite {
        message: format!("ingest task: {e}"),
    }))??;

    // ── SUMMARIZING ──
    let final_stats = ExecStats {
        ran: ingest_summary.passed
            + ingest_summary.failed
            + ingest_summary.skipped
            + ingest_summary.errors,
        passed: ingest_summary.passed,
        failed: ingest_summary.failed + ingest_summary.errors,
        skipped: ingest_summary.skipped,
    };
    emit(&progress, ExecutionStage::Summarizing, 95, None, final_stats);

    let summary = ExecutionSummary {
        execution_id: request.execution_id,
        rule_name: rule.name,
        stage: ExecutionStage::Done,
        selected: total,
        ran: final_stats.ran,
        passed: ingest_summary.passed,
        failed: ingest_summary.failed,
        skipped: ingest_summary.skipped,
        errors: ingest_summary.errors,
        duration_seconds: started.elapsed().as_secs_f64(),
        coverage_percent: coverage_data.as_ref().map(|d| d.total_coverage),
    };

    emit(&progress, ExecutionStage::Done, 100, None, final_stats);
    info!(
        execution_id = %summary.execution_id,
        passed = summary.passed,
        failed = summary.failed,
        "execution finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_terminality() {
        assert!(ExecutionStage::Done.is_terminal());
        assert!(ExecutionStage::Cancelled.is_terminal());
        assert!(ExecutionStage::Failed.is_terminal());
        assert!(!ExecutionStage::Ingesting.is_terminal());
    }

    #[test]
    fn progress_lines_parse() {
        let (node, outcome) = parse_progress_line("tests/a.py::t1 PASSED [ 50%]").unwrap();
        assert_eq!(node, "tests/a.py::t1");
        assert_eq!(outcome, OutcomeStatus::Passed);
        assert!(parse_progress_line("collecting 12 items").is_none());
        assert!(parse_progress_line("tests/a.py::t1").is_none());
    }

    #[test]
    fn progress_event_serializes_lowercase_stage() {
        let event = ProgressEvent {
            stage: ExecutionStage::Executing,
            percent: 42,
            current_entity: None,
            stats: ExecStats::default(),
            ts: 0,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"stage\":\"executing\""));
        assert!(!json.contains("current_entity"));
    }
}
