//! CI run ingestion: fetched run/job seeds plus raw logs → store rows.
//!
//! Converges under re-ingest: run and job rows are upserts by remote id,
//! outcome rows dedupe on `(entity_id, execution_id)`.

use rustc_hash::FxHashSet;
use tracing::info;

use argos_core::errors::StoreError;
use argos_core::ids;
use argos_core::types::entity::{EntityType, OutcomeStatus, Space};
use argos_parsers::ci_log;
use argos_storage::queries::ci::{NewCiWorkflowJob, NewCiWorkflowRun};
use argos_storage::queries::{ci, execution_history};
use argos_storage::ArgosStorageEngine;

use crate::error::EngineError;
use crate::stats;

/// One job's seed row plus its raw log when fetched.
#[derive(Debug, Clone)]
pub struct CiJobData {
    pub job: NewCiWorkflowJob,
    pub log: Option<String>,
}

/// A fetched CI run ready for ingestion.
#[derive(Debug, Clone)]
pub struct CiRunData {
    pub run: NewCiWorkflowRun,
    pub jobs: Vec<CiJobData>,
}

/// What a CI ingest wrote.
#[derive(Debug, Clone, Default)]
pub struct CiIngestSummary {
    pub run_id: i64,
    pub jobs: usize,
    pub history_rows: usize,
    pub failed_tests: usize,
}

fn job_outcome(conclusion: Option<&str>) -> OutcomeStatus {
    match conclusion {
        Some("success") => OutcomeStatus::Passed,
        Some("failure") => OutcomeStatus::Failed,
        Some("skipped") | Some("cancelled") | Some("neutral") => OutcomeStatus::Skipped,
        _ => OutcomeStatus::Error,
    }
}

pub(super) fn ingest(
    store: &ArgosStorageEngine,
    data: &CiRunData,
) -> Result<CiIngestSummary, EngineError> {
    let summary = store.ingest_transaction(|conn| {
        let mut summary = CiIngestSummary {
            run_id: data.run.run_id,
            jobs: data.jobs.len(),
            ..CiIngestSummary::default()
        };
        let mut touched: FxHashSet<String> = FxHashSet::default();

        ci::upsert_run(conn, &data.run)?;

        for job_data in &data.jobs {
            let job = &job_data.job;
            ci::upsert_job(conn, job)?;

            let execution_id =
                ids::ci_job_execution_id(data.run.run_id as u64, job.job_id as u64);
            let timestamp = job
                .completed_at
                .or(job.started_at)
                .or(data.run.started_at)
                .unwrap_or(0);
            let platform = job.runner_os.clone().unwrap_or_else(|| "unknown".into());
            let duration = match (job.started_at, job.completed_at) {
                (Some(start), Some(end)) if end >= start => (end - start) as f64,
                _ => 0.0,
            };

            // Job-level outcome row.
            let job_row = execution_history::NewExecutionHistory {
                entity_id: job.job_name.clone(),
                entity_type: EntityType::CiJob.as_str().to_string(),
                execution_id: execution_id.clone(),
                timestamp,
                status: job_outcome(job.conclusion.as_deref()).as_str().to_string(),
                duration_seconds: duration,
                space: Space::Ci.as_str().to_string(),
                metadata_json: platform_metadata(&platform, None),
            };
            if execution_history::insert_dedupe(conn, &job_row)? {
                summary.history_rows += 1;
            }
            touched.insert(job.job_name.clone());

            // Per-test outcomes extracted from the stored log.
            if let Some(log) = &job_data.log {
                ci::set_job_log(conn, job.job_id, log)?;
                let parsed = ci_log::parse(log);
                if parsed != ci_log::CiLogData::default() {
                    let results_json = serde_json::to_string(&parsed)
                        .map_err(|e| StoreError::Sqlite {
                            message: format!("encode ci log data: {e}"),
                        })?;
                    ci::set_job_test_results(conn, job.job_id, &results_json)?;
                }

                for failed in &parsed.failed_tests {
                    let row = execution_history::NewExecutionHistory {
                        entity_id: failed.node_id.clone(),
                        entity_type: EntityType::Test.as_str().to_string(),
                        execution_id: execution_id.clone(),
                        timestamp,
                        status: OutcomeStatus::Failed.as_str().to_string(),
                        duration_seconds: 0.0,
                        space: Space::Ci.as_str().to_string(),
                        metadata_json: platform_metadata(&platform, Some(&failed.error)),
                    };
                    if execution_history::insert_dedupe(conn, &row)? {
                        summary.history_rows += 1;
                        summary.failed_tests += 1;
                    }
                    touched.insert(failed.node_id.clone());
                }
            }
        }

        let mut entities: Vec<String> = touched.into_iter().collect();
        entities.sort();
        stats::recompute_entities(conn, &entities)?;

        Ok(summary)
    })?;

    info!(
        run_id = summary.run_id,
        jobs = summary.jobs,
        rows = summary.history_rows,
        "ingested CI run"
    );
    Ok(summary)
}

fn platform_metadata(platform: &str, error: Option<&str>) -> Option<String> {
    let mut map = serde_json::Map::new();
    map.insert("platform".to_string(), serde_json::Value::from(platform));
    if let Some(error) = error {
        if !error.is_empty() {
            map.insert("error".to_string(), serde_json::Value::from(error));
        }
    }
    serde_json::to_string(&serde_json::Value::Object(map)).ok()
}
