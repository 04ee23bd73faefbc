//! coverage_history and coverage_summaries table queries.

use serde::Serialize;
use rusqlite::{params, Connection, OptionalExtension};

use argos_core::errors::StoreError;

use crate::connection::sqe;

#[derive(Debug, Clone, Serialize)]
pub struct CoverageHistoryRecord {
    pub id: i64,
    pub execution_id: String,
    pub file_path: String,
    pub timestamp: i64,
    pub total_statements: i64,
    pub covered_statements: i64,
    pub coverage_percentage: f64,
    pub missing_lines_json: String,
    pub space: String,
}

#[derive(Debug, Clone)]
pub struct NewCoverageHistory {
    pub execution_id: String,
    pub file_path: String,
    pub timestamp: i64,
    pub total_statements: i64,
    pub covered_statements: i64,
    pub coverage_percentage: f64,
    pub missing_lines_json: String,
    pub space: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverageSummaryRecord {
    pub id: i64,
    pub execution_id: String,
    pub timestamp: i64,
    pub total_coverage: f64,
    pub files_analyzed: i64,
    pub total_statements: i64,
    pub covered_statements: i64,
    pub space: String,
}

#[derive(Debug, Clone)]
pub struct NewCoverageSummary {
    pub execution_id: String,
    pub timestamp: i64,
    pub total_coverage: f64,
    pub files_analyzed: i64,
    pub total_statements: i64,
    pub covered_statements: i64,
    pub space: String,
}

#[derive(Debug, Clone, Default)]
pub struct CoverageHistoryFilter {
    pub execution_id: Option<String>,
    pub file_path: Option<String>,
    pub space: Option<String>,
    pub limit: Option<usize>,
}

fn map_history(row: &rusqlite::Row<'_>) -> rusqlite::Result<CoverageHistoryRecord> {
    Ok(CoverageHistoryRecord {
        id: row.get(0)?,
        execution_id: row.get(1)?,
        file_path: row.get(2)?,
        timestamp: row.get(3)?,
        total_statements: row.get(4)?,
        covered_statements: row.get(5)?,
        coverage_percentage: row.get(6)?,
        missing_lines_json: row.get(7)?,
        space: row.get(8)?,
    })
}

fn map_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<CoverageSummaryRecord> {
    Ok(CoverageSummaryRecord {
        id: row.get(0)?,
        execution_id: row.get(1)?,
        timestamp: row.get(2)?,
        total_coverage: row.get(3)?,
        files_analyzed: row.get(4)?,
        total_statements: row.get(5)?,
        covered_statements: row.get(6)?,
        space: row.get(7)?,
    })
}

/// Insert per-file rows for one execution. Re-ingest replaces: callers
/// delete the execution's rows first when converging.
pub fn insert_history(
    conn: &Connection,
    rows: &[NewCoverageHistory],
) -> Result<usize, StoreError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO coverage_history
             (execution_id, file_path, timestamp, total_statements,
              covered_statements, coverage_percentage, missing_lines_json, space)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .map_err(sqe)?;

    let mut count = 0;
    for row in rows {
        stmt.execute(params![
            row.execution_id,
            row.file_path,
            row.timestamp,
            row.total_statements,
            row.covered_statements,
            row.coverage_percentage,
            row.missing_lines_json,
            row.space,
        ])
        .map_err(sqe)?;
        count += 1;
    }
    Ok(count)
}

/// Remove per-file rows for one execution (re-ingest convergence).
pub fn delete_history_for_execution(
    conn: &Connection,
    execution_id: &str,
) -> Result<usize, StoreError> {
    conn.execute(
        "DELETE FROM coverage_history WHERE execution_id = ?1",
        params![execution_id],
    )
    .map_err(sqe)
}

/// Insert or replace the summary for one execution.
pub fn upsert_summary(conn: &Connection, row: &NewCoverageSummary) -> Result<(), StoreError> {
    conn.prepare_cached(
        "INSERT INTO coverage_summaries
         (execution_id, timestamp, total_coverage, files_analyzed,
          total_statements, covered_statements, space)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (execution_id) DO UPDATE SET
            timestamp = excluded.timestamp,
            total_coverage = excluded.total_coverage,
            files_analyzed = excluded.files_analyzed,
            total_statements = excluded.total_statements,
            covered_statements = excluded.covered_statements,
            space = excluded.space",
    )
    .map_err(sqe)?
    .execute(params![
        row.execution_id,
        row.timestamp,
        row.total_coverage,
        row.files_analyzed,
        row.total_statements,
        row.covered_statements,
        row.space,
    ])
    .map_err(sqe)?;
    Ok(())
}

/// Filtered per-file history, newest first.
pub fn query_history(
    conn: &Connection,
    filter: &CoverageHistoryFilter,
) -> Result<Vec<CoverageHistoryRecord>, StoreError> {
    let mut sql = String::from(
        "SELECT id, execution_id, file_path, timestamp, total_statements,
                covered_statements, coverage_percentage, missing_lines_json, space
         FROM coverage_history WHERE 1=1",
    );
    let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(execution_id) = &filter.execution_id {
        sql.push_str(" AND execution_id = ?");
        args.push(Box::new(execution_id.clone()));
    }
    if let Some(file_path) = &filter.file_path {
        sql.push_str(" AND file_path = ?");
        args.push(Box::new(file_path.clone()));
    }
    if let Some(space) = &filter.space {
        sql.push_str(" AND space = ?");
        args.push(Box::new(space.clone()));
    }
    sql.push_str(" ORDER BY timestamp DESC, file_path");
    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ?");
        args.push(Box::new(limit as i64));
    }

    let mut stmt = conn.prepare(&sql).map_err(sqe)?;
    let rows = stmt
        .query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            map_history,
        )
        .map_err(sqe)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(sqe)?);
    }
    Ok(result)
}

/// Per-file rows for one execution, ordered by file path.
pub fn history_for_execution(
    conn: &Connection,
    execution_id: &str,
) -> Result<Vec<CoverageHistoryRecord>, StoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, execution_id, file_path, timestamp, total_statements,
                    covered_statements, coverage_percentage, missing_lines_json, space
             FROM coverage_history WHERE execution_id = ?1 ORDER BY file_path",
        )
        .map_err(sqe)?;
    let rows = stmt.query_map(params![execution_id], map_history).map_err(sqe)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(sqe)?);
    }
    Ok(result)
}

/// Summaries, newest first, optionally space-scoped.
pub fn query_summaries(
    conn: &Connection,
    space: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<CoverageSummaryRecord>, StoreError> {
    let mut sql = String::from(
        "SELECT id, execution_id, timestamp, total_coverage, files_analyzed,
                total_statements, covered_statements, space
         FROM coverage_summaries WHERE 1=1",
    );
    let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(space) = space {
        sql.push_str(" AND space = ?");
        args.push(Box::new(space.to_string()));
    }
    sql.push_str(" ORDER BY timestamp DESC");
    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        args.push(Box::new(limit as i64));
    }

    let mut stmt = conn.prepare(&sql).map_err(sqe)?;
    let rows = stmt
        .query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            map_summary,
        )
        .map_err(sqe)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(sqe)?);
    }
    Ok(result)
}

/// Fetch the summary for one execution.
pub fn get_summary(
    conn: &Connection,
    execution_id: &str,
) -> Result<Option<CoverageSummaryRecord>, StoreError> {
    conn.prepare_cached(
        "SELECT id, execution_id, timestamp, total_coverage, files_analyzed,
                total_statements, covered_statements, space
         FROM coverage_summaries WHERE execution_id = ?1",
    )
    .map_err(sqe)?
    .query_row(params![execution_id], map_summary)
    .optional()
    .map_err(sqe)
}

/// Count summaries (test support).
pub fn count_summaries(conn: &Connection) -> Result<i64, StoreError> {
    conn.query_row("SELECT COUNT(*) FROM coverage_summaries", [], |row| row.get(0))
        .map_err(sqe)
}
