//! CI endpoints: stored run/job reads, on-demand fetch+ingest from the
//! provider, job log retrieval/parsing, and run-level comparison.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use argos_ci::{CiClient, CiClientConfig};
use argos_engine::ingest::{CiJobData, CiRunData};
use argos_engine::Ingestor;
use argos_parsers::ci_log::{self, CiLogData};
use argos_storage::queries::ci::{CiRunFilter, CiWorkflowJobRecord, CiWorkflowRunRecord};
use argos_storage::queries::execution_history::HistoryFilter;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RunsParams {
    pub workflow: Option<String>,
    pub branch: Option<String>,
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn list_runs(
    State(state): State<AppState>,
    Query(params): Query<RunsParams>,
) -> Result<Json<Vec<CiWorkflowRunRecord>>, ApiError> {
    let filter = CiRunFilter {
        workflow: params.workflow,
        branch: params.branch,
        status: params.status,
        limit: Some(params.limit.unwrap_or(50).min(500)),
        offset: params.offset,
    };
    Ok(Json(state.store.list_ci_runs(&filter)?))
}

pub async fn jobs(
    State(state): State<AppState>,
    Path(run_id): Path<i64>,
) -> Result<Json<Vec<CiWorkflowJobRecord>>, ApiError> {
    if state.store.get_ci_run(run_id)?.is_none() {
        return Err(ApiError::not_found(format!("ci run {run_id}")));
    }
    Ok(Json(state.store.ci_jobs_for_run(run_id)?))
}

fn ci_client(state: &AppState) -> Result<CiClient, ApiError> {
    let repository = state
        .config
        .ci
        .repository
        .clone()
        .ok_or_else(|| ApiError::bad_request("ci.repository is not configured"))?;
    let token = std::env::var(&state.config.ci.token_env).ok();
    CiClient::new(CiClientConfig {
        repository,
        token,
        api_url: state.config.ci.api_url.clone(),
    })
    .map_err(ApiError::from)
}

#[derive(Debug, Serialize)]
pub struct FetchSummary {
    pub run_id: i64,
    pub jobs: usize,
    pub history_rows: usize,
    pub failed_tests: usize,
}

/// Fetch one run (jobs + failed-job logs) from the provider and ingest
/// it. Safe to repeat; re-ingest converges.
pub async fn fetch_run(
    State(state): State<AppState>,
    Path(run_id): Path<i64>,
) -> Result<Json<FetchSummary>, ApiError> {
    let client = ci_client(&state)?;

    let run = client.get_run(run_id).await?;
    let jobs = client.list_jobs(run_id).await?;
    let mut job_data = Vec::with_capacity(jobs.len());
    for job in &jobs {
        // Logs are fetched for finished jobs; a log fetch failure skips
        // the log, not the job.
        let log = if job.conclusion.is_some() {
            match client.fetch_job_log(job.id).await {
                Ok(log) => Some(log),
                Err(e) => {
                    warn!(job_id = job.id, "job log unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };
        job_data.push(CiJobData {
            job: job.to_seed(),
            log,
        });
    }

    let data = CiRunData {
        run: run.to_seed(),
        jobs: job_data,
    };

    let store = Arc::clone(&state.store);
    let summary = tokio::task::spawn_blocking(move || {
        Ingestor::new(&store).ingest_ci_run(&data)
    })
    .await
    .map_err(|e| ApiError::bad_request(format!("ingest task: {e}")))??;

    Ok(Json(FetchSummary {
        run_id: summary.run_id,
        jobs: summary.jobs,
        history_rows: summary.history_rows,
        failed_tests: summary.failed_tests,
    }))
}

pub async fn job_log(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> Result<String, ApiError> {
    state
        .store
        .ci_job_log(job_id)?
        .ok_or_else(|| ApiError::not_found(format!("log for ci job {job_id}")))
}

pub async fn parse_job_log(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> Result<Json<CiLogData>, ApiError> {
    let log = state
        .store
        .ci_job_log(job_id)?
        .ok_or_else(|| ApiError::not_found(format!("log for ci job {job_id}")))?;
    Ok(Json(ci_log::parse(&log)))
}

#[derive(Debug, Deserialize)]
pub struct CompareParams {
    pub local_execution_id: String,
    pub ci_run_id: i64,
}

#[derive(Debug, Serialize)]
pub struct SpaceCounts {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Serialize)]
pub struct RunComparison {
    pub local_execution_id: String,
    pub ci_run_id: i64,
    pub local: SpaceCounts,
    pub ci: SpaceCounts,
    /// Tests failing in exactly one of the two runs.
    pub only_failed_locally: Vec<String>,
    pub only_failed_on_ci: Vec<String>,
}

/// Compare one local execution's outcomes with one CI run's outcomes.
pub async fn compare(
    State(state): State<AppState>,
    Query(params): Query<CompareParams>,
) -> Result<Json<RunComparison>, ApiError> {
    let local_rows = state.store.get_execution_history(&HistoryFilter {
        execution_id: Some(params.local_execution_id.clone()),
        ..HistoryFilter::default()
    })?;
    if local_rows.is_empty() {
        return Err(ApiError::not_found(format!(
            "execution {}",
            params.local_execution_id
        )));
    }
    if state.store.get_ci_run(params.ci_run_id)?.is_none() {
        return Err(ApiError::not_found(format!("ci run {}", params.ci_run_id)));
    }

    // CI rows of this run share the `ci-{run}-` execution-id prefix.
    let prefix = format!("ci-{}-", params.ci_run_id);
    let ci_rows: Vec<_> = state
        .store
        .get_execution_history(&HistoryFilter {
            entity_type: Some("test".to_string()),
            space: Some("ci".to_string()),
            limit: Some(10_000),
            ..HistoryFilter::default()
        })?
        .into_iter()
        .filter(|row| row.execution_id.starts_with(&prefix))
        .collect();

    let count = |rows: &[argos_storage::queries::execution_history::ExecutionHistoryRecord]| {
        SpaceCounts {
            passed: rows.iter().filter(|r| r.status == "PASSED").count(),
            failed: rows
                .iter()
                .filter(|r| r.status == "FAILED" || r.status == "ERROR")
                .count(),
            skipped: rows.iter().filter(|r| r.status == "SKIPPED").count(),
        }
    };

    let failed_set = |rows: &[argos_storage::queries::execution_history::ExecutionHistoryRecord]| {
        rows.iter()
            .filter(|r| r.status == "FAILED" || r.status == "ERROR")
            .map(|r| r.entity_id.clone())
            .collect::<Vec<_>>()
    };

    let local_failed = failed_set(&local_rows);
    let ci_failed = failed_set(&ci_rows);

    let mut only_failed_locally: Vec<String> = local_failed
        .iter()
        .filter(|e| !ci_failed.contains(e))
        .cloned()
        .collect();
    let mut only_failed_on_ci: Vec<String> = ci_failed
        .iter()
        .filter(|e| !local_failed.contains(e))
        .cloned()
        .collect();
    only_failed_locally.sort();
    only_failed_locally.dedup();
    only_failed_on_ci.sort();
    only_failed_on_ci.dedup();

    Ok(Json(RunComparison {
        local_execution_id: params.local_execution_id,
        ci_run_id: params.ci_run_id,
        local: count(&local_rows),
        ci: count(&ci_rows),
        only_failed_locally,
        only_failed_on_ci,
    }))
}
