//! v002: CI workflow run/job tables.

use rusqlite::Connection;

use argos_core::errors::StoreError;

use crate::connection::sqe;

pub fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS ci_workflow_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id INTEGER NOT NULL UNIQUE,
            workflow_name TEXT NOT NULL,
            branch TEXT NOT NULL DEFAULT '',
            commit_sha TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT '',
            conclusion TEXT,
            started_at INTEGER,
            duration_seconds REAL,
            run_number INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_ci_workflow_runs_branch
            ON ci_workflow_runs (branch, started_at DESC);
        CREATE INDEX IF NOT EXISTS idx_ci_workflow_runs_workflow
            ON ci_workflow_runs (workflow_name, started_at DESC);

        CREATE TABLE IF NOT EXISTS ci_workflow_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id INTEGER NOT NULL UNIQUE,
            run_id INTEGER NOT NULL REFERENCES ci_workflow_runs(run_id),
            job_name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT '',
            conclusion TEXT,
            started_at INTEGER,
            completed_at INTEGER,
            runner_os TEXT,
            log_content TEXT,
            test_results_json TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_ci_workflow_jobs_run
            ON ci_workflow_jobs (run_id);
        ",
    )
    .map_err(sqe)
}
