//! ci_workflow_runs and ci_workflow_jobs table queries.
//!
//! Run and job rows are upserted by remote id so repeated fetches of the
//! same run converge. Job logs are filled on demand and can be large.

use serde::Serialize;
use rusqlite::{params, Connection, OptionalExtension};

use argos_core::errors::StoreError;

use crate::connection::sqe;

#[derive(Debug, Clone, Serialize)]
pub struct CiWorkflowRunRecord {
    pub id: i64,
    pub run_id: i64,
    pub workflow_name: String,
    pub branch: String,
    pub commit_sha: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub started_at: Option<i64>,
    pub duration_seconds: Option<f64>,
    pub run_number: i64,
}

#[derive(Debug, Clone)]
pub struct NewCiWorkflowRun {
    pub run_id: i64,
    pub workflow_name: String,
    pub branch: String,
    pub commit_sha: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub started_at: Option<i64>,
    pub duration_seconds: Option<f64>,
    pub run_number: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CiWorkflowJobRecord {
    pub id: i64,
    pub job_id: i64,
    pub run_id: i64,
    pub job_name: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub runner_os: Option<String>,
    pub has_log: bool,
    pub test_results_json: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCiWorkflowJob {
    pub job_id: i64,
    pub run_id: i64,
    pub job_name: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub runner_os: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CiRunFilter {
    pub workflow: Option<String>,
    pub branch: Option<String>,
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

fn map_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<CiWorkflowRunRecord> {
    Ok(CiWorkflowRunRecord {
        id: row.get(0)?,
        run_id: row.get(1)?,
        workflow_name: row.get(2)?,
        branch: row.get(3)?,
        commit_sha: row.get(4)?,
        status: row.get(5)?,
        conclusion: row.get(6)?,
        started_at: row.get(7)?,
        duration_seconds: row.get(8)?,
        run_number: row.get(9)?,
    })
}

fn map_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<CiWorkflowJobRecord> {
    Ok(CiWorkflowJobRecord {
        id: row.get(0)?,
        job_id: row.get(1)?,
        run_id: row.get(2)?,
        job_name: row.get(3)?,
        status: row.get(4)?,
        conclusion: row.get(5)?,
        started_at: row.get(6)?,
        completed_at: row.get(7)?,
        runner_os: row.get(8)?,
        has_log: row.get::<_, i64>(9)? != 0,
        test_results_json: row.get(10)?,
    })
}

const JOB_COLS: &str = "id, job_id, run_id, job_name, status, conclusion, started_at,
     completed_at, runner_os, log_content IS NOT NULL, test_results_json";

/// Insert or update a run by remote id.
pub fn upsert_run(conn: &Connection, row: &NewCiWorkflowRun) -> Result<(), StoreError> {
    conn.prepare_cached(
        "INSERT INTO ci_workflow_runs
         (run_id, workflow_name, branch, commit_sha, status, conclusion,
          started_at, duration_seconds, run_number)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT (run_id) DO UPDATE SET
            workflow_name = excluded.workflow_name,
            branch = excluded.branch,
            commit_sha = excluded.commit_sha,
            status = excluded.status,
            conclusion = excluded.conclusion,
            started_at = excluded.started_at,
            duration_seconds = excluded.duration_seconds,
            run_number = excluded.run_number",
    )
    .map_err(sqe)?
    .execute(params![
        row.run_id,
        row.workflow_name,
        row.branch,
        row.commit_sha,
        row.status,
        row.conclusion,
        row.started_at,
        row.duration_seconds,
        row.run_number,
    ])
    .map_err(sqe)?;
    Ok(())
}

/// Insert or update a job by remote id. Log content and parsed test
/// results are preserved across upserts.
pub fn upsert_job(conn: &Connection, row: &NewCiWorkflowJob) -> Result<(), StoreError> {
    conn.prepare_cached(
        "INSERT INTO ci_workflow_jobs
         (job_id, run_id, job_name, status, conclusion, started_at,
          completed_at, runner_os)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT (job_id) DO UPDATE SET
            run_id = excluded.run_id,
            job_name = excluded.job_name,
            status = excluded.status,
            conclusion = excluded.conclusion,
            started_at = excluded.started_at,
            completed_at = excluded.completed_at,
            runner_os = excluded.runner_os",
    )
    .map_err(sqe)?
    .execute(params![
        row.job_id,
        row.run_id,
        row.job_name,
        row.status,
        row.conclusion,
        row.started_at,
        row.completed_at,
        row.runner_os,
    ])
    .map_err(sqe)?;
    Ok(())
}

/// Store a fetched job log.
pub fn set_job_log(conn: &Connection, job_id: i64, log: &str) -> Result<(), StoreError> {
    let n = conn
        .execute(
            "UPDATE ci_workflow_jobs SET log_content = ?2 WHERE job_id = ?1",
            params![job_id, log],
        )
        .map_err(sqe)?;
    if n == 0 {
        return Err(StoreError::NotFound {
            what: format!("ci job {job_id}"),
        });
    }
    Ok(())
}

/// Store parsed structured results for a job.
pub fn set_job_test_results(
    conn: &Connection,
    job_id: i64,
    results_json: &str,
) -> Result<(), StoreError> {
    let n = conn
        .execute(
            "UPDATE ci_workflow_jobs SET test_results_json = ?2 WHERE job_id = ?1",
            params![job_id, results_json],
        )
        .map_err(sqe)?;
    if n == 0 {
        return Err(StoreError::NotFound {
            what: format!("ci job {job_id}"),
        });
    }
    Ok(())
}

/// Fetch the stored log for a job.
pub fn job_log(conn: &Connection, job_id: i64) -> Result<Option<String>, StoreError> {
    conn.prepare_cached("SELECT log_content FROM ci_workflow_jobs WHERE job_id = ?1")
        .map_err(sqe)?
        .query_row(params![job_id], |row| row.get::<_, Option<String>>(0))
        .optional()
        .map_err(sqe)
        .map(Option::flatten)
}

/// Filtered run listing, newest first.
pub fn list_runs(
    conn: &Connection,
    filter: &CiRunFilter,
) -> Result<Vec<CiWorkflowRunRecord>, StoreError> {
    let mut sql = String::from(
        "SELECT id, run_id, workflow_name, branch, commit_sha, status, conclusion,
                started_at, duration_seconds, run_number
         FROM ci_workflow_runs WHERE 1=1",
    );
    let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(workflow) = &filter.workflow {
        sql.push_str(" AND workflow_name = ?");
        args.push(Box::new(workflow.clone()));
    }
    if let Some(branch) = &filter.branch {
        sql.push_str(" AND branch = ?");
        args.push(Box::new(branch.clone()));
    }
    if let Some(status) = &filter.status {
        sql.push_str(" AND status = ?");
        args.push(Box::new(status.clone()));
    }
    sql.push_str(" ORDER BY started_at DESC, run_id DESC");
    sql.push_str(" LIMIT ? OFFSET ?");
    args.push(Box::new(filter.limit.unwrap_or(50) as i64));
    args.push(Box::new(filter.offset.unwrap_or(0) as i64));

    let mut stmt = conn.prepare(&sql).map_err(sqe)?;
    let rows = stmt
        .query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            map_run,
        )
        .map_err(sqe)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(sqe)?);
    }
    Ok(result)
}

/// Fetch one run by remote id.
pub fn get_run(conn: &Connection, run_id: i64) -> Result<Option<CiWorkflowRunRecord>, StoreError> {
    conn.prepare_cached(
        "SELECT id, run_id, workflow_name, branch, commit_sha, status, conclusion,
                started_at, duration_seconds, run_number
         FROM ci_workflow_runs WHERE run_id = ?1",
    )
    .map_err(sqe)?
    .query_row(params![run_id], map_run)
    .optional()
    .map_err(sqe)
}

/// Jobs of one run, ordered by remote job id.
pub fn jobs_for_run(
    conn: &Connection,
    run_id: i64,
) -> Result<Vec<CiWorkflowJobRecord>, StoreError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {JOB_COLS} FROM ci_workflow_jobs WHERE run_id = ?1 ORDER BY job_id"
        ))
        .map_err(sqe)?;
    let rows = stmt.query_map(params![run_id], map_job).map_err(sqe)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(sqe)?);
    }
    Ok(result)
}

/// Fetch one job by remote id.
pub fn get_job(conn: &Connection, job_id: i64) -> Result<Option<CiWorkflowJobRecord>, StoreError> {
    conn.prepare_cached(&format!(
        "SELECT {JOB_COLS} FROM ci_workflow_jobs WHERE job_id = ?1"
    ))
    .map_err(sqe)?
    .query_row(params![job_id], map_job)
    .optional()
    .map_err(sqe)
}

/// Count runs (test support).
pub fn count_runs(conn: &Connection) -> Result<i64, StoreError> {
    conn.query_row("SELECT COUNT(*) FROM ci_workflow_runs", [], |row| row.get(0))
        .map_err(sqe)
}

/// Count jobs (test support).
pub fn count_jobs(conn: &Connection) -> Result<i64, StoreError> {
    conn.query_row("SELECT COUNT(*) FROM ci_workflow_jobs", [], |row| row.get(0))
        .map_err(sqe)
}
