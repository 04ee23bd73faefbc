//! lint_violations and lint_summaries table queries.
//!
//! A summary's by_code histogram is exactly the multiset of codes among its
//! violation rows for the same `(execution_id, validator)`: re-ingest of
//! that pair replaces both sides together.

use serde::Serialize;
use rusqlite::{params, Connection, OptionalExtension};

use argos_core::errors::StoreError;

use crate::connection::sqe;

#[derive(Debug, Clone, Serialize)]
pub struct LintViolationRecord {
    pub id: i64,
    pub execution_id: String,
    pub file_path: String,
    pub line: i64,
    pub column_num: Option<i64>,
    pub severity: String,
    pub code: String,
    pub message: String,
    pub validator: String,
    pub timestamp: i64,
    pub space: String,
}

#[derive(Debug, Clone)]
pub struct NewLintViolation {
    pub execution_id: String,
    pub file_path: String,
    pub line: i64,
    pub column_num: Option<i64>,
    pub severity: String,
    pub code: String,
    pub message: String,
    pub validator: String,
    pub timestamp: i64,
    pub space: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LintSummaryRecord {
    pub id: i64,
    pub execution_id: String,
    pub timestamp: i64,
    pub validator: String,
    pub files_scanned: i64,
    pub total_violations: i64,
    pub errors: i64,
    pub warnings: i64,
    pub info: i64,
    pub by_code_json: String,
    pub space: String,
}

#[derive(Debug, Clone)]
pub struct NewLintSummary {
    pub execution_id: String,
    pub timestamp: i64,
    pub validator: String,
    pub files_scanned: i64,
    pub total_violations: i64,
    pub errors: i64,
    pub warnings: i64,
    pub info: i64,
    pub by_code_json: String,
    pub space: String,
}

#[derive(Debug, Clone, Default)]
pub struct LintViolationFilter {
    pub execution_id: Option<String>,
    pub validator: Option<String>,
    pub file_path: Option<String>,
    pub severity: Option<String>,
    pub space: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct LintSummaryFilter {
    pub execution_id: Option<String>,
    pub validator: Option<String>,
    pub space: Option<String>,
    pub since: Option<i64>,
    pub limit: Option<usize>,
}

/// Insert violation rows for one `(execution_id, validator)` pair.
pub fn insert_violations(
    conn: &Connection,
    rows: &[NewLintViolation],
) -> Result<usize, StoreError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO lint_violations
             (execution_id, file_path, line, column_num, severity, code,
              message, validator, timestamp, space)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .map_err(sqe)?;

    let mut count = 0;
    for row in rows {
        stmt.execute(params![
            row.execution_id,
            row.file_path,
            row.line,
            row.column_num,
            row.severity,
            row.code,
            row.message,
            row.validator,
            row.timestamp,
            row.space,
        ])
        .map_err(sqe)?;
        count += 1;
    }
    Ok(count)
}

/// Remove the violation rows belonging to one `(execution_id, validator)`
/// pair. Called before re-insert when a summary is replaced.
pub fn delete_violations_for(
    conn: &Connection,
    execution_id: &str,
    validator: &str,
) -> Result<usize, StoreError> {
    conn.execute(
        "DELETE FROM lint_violations WHERE execution_id = ?1 AND validator = ?2",
        params![execution_id, validator],
    )
    .map_err(sqe)
}

/// Insert or replace the summary for `(execution_id, validator)`.
pub fn upsert_summary(conn: &Connection, row: &NewLintSummary) -> Result<(), StoreError> {
    conn.prepare_cached(
        "INSERT INTO lint_summaries
         (execution_id, timestamp, validator, files_scanned, total_violations,
          errors, warnings, info, by_code_json, space)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT (execution_id, validator) DO UPDATE SET
            timestamp = excluded.timestamp,
            files_scanned = excluded.files_scanned,
            total_violations = excluded.total_violations,
            errors = excluded.errors,
            warnings = excluded.warnings,
            info = excluded.info,
            by_code_json = excluded.by_code_json,
            space = excluded.space",
    )
    .map_err(sqe)?
    .execute(params![
        row.execution_id,
        row.timestamp,
        row.validator,
        row.files_scanned,
        row.total_violations,
        row.errors,
        row.warnings,
        row.info,
        row.by_code_json,
        row.space,
    ])
    .map_err(sqe)?;
    Ok(())
}

fn map_violation(row: &rusqlite::Row<'_>) -> rusqlite::Result<LintViolationRecord> {
    Ok(LintViolationRecord {
        id: row.get(0)?,
        execution_id: row.get(1)?,
        file_path: row.get(2)?,
        line: row.get(3)?,
        column_num: row.get(4)?,
        severity: row.get(5)?,
        code: row.get(6)?,
        message: row.get(7)?,
        validator: row.get(8)?,
        timestamp: row.get(9)?,
        space: row.get(10)?,
    })
}

fn map_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<LintSummaryRecord> {
    Ok(LintSummaryRecord {
        id: row.get(0)?,
        execution_id: row.get(1)?,
        timestamp: row.get(2)?,
        validator: row.get(3)?,
        files_scanned: row.get(4)?,
        total_violations: row.get(5)?,
        errors: row.get(6)?,
        warnings: row.get(7)?,
        info: row.get(8)?,
        by_code_json: row.get(9)?,
        space: row.get(10)?,
    })
}

/// Filtered violation read, newest first, then file/line for stability.
pub fn query_violations(
    conn: &Connection,
    filter: &LintViolationFilter,
) -> Result<Vec<LintViolationRecord>, StoreError> {
    let mut sql = String::from(
        "SELECT id, execution_id, file_path, line, column_num, severity, code,
                message, validator, timestamp, space
         FROM lint_violations WHERE 1=1",
    );
    let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(execution_id) = &filter.execution_id {
        sql.push_str(" AND execution_id = ?");
        args.push(Box::new(execution_id.clone()));
    }
    if let Some(validator) = &filter.validator {
        sql.push_str(" AND validator = ?");
        args.push(Box::new(validator.clone()));
    }
    if let Some(file_path) = &filter.file_path {
        sql.push_str(" AND file_path = ?");
        args.push(Box::new(file_path.clone()));
    }
    if let Some(severity) = &filter.severity {
        sql.push_str(" AND severity = ?");
        args.push(Box::new(severity.clone()));
    }
    if let Some(space) = &filter.space {
        sql.push_str(" AND space = ?");
        args.push(Box::new(space.clone()));
    }
    sql.push_str(" ORDER BY timestamp DESC, file_path, line");
    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ?");
        args.push(Box::new(limit as i64));
    }

    let mut stmt = conn.prepare(&sql).map_err(sqe)?;
    let rows = stmt
        .query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            map_violation,
        )
        .map_err(sqe)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(sqe)?);
    }
    Ok(result)
}

/// Filtered summary read, newest first.
pub fn query_summaries(
    conn: &Connection,
    filter: &LintSummaryFilter,
) -> Result<Vec<LintSummaryRecord>, StoreError> {
    let mut sql = String::from(
        "SELECT id, execution_id, timestamp, validator, files_scanned,
                total_violations, errors, warnings, info, by_code_json, space
         FROM lint_summaries WHERE 1=1",
    );
    let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(execution_id) = &filter.execution_id {
        sql.push_str(" AND execution_id = ?");
        args.push(Box::new(execution_id.clone()));
    }
    if let Some(validator) = &filter.validator {
        sql.push_str(" AND validator = ?");
        args.push(Box::new(validator.clone()));
    }
    if let Some(space) = &filter.space {
        sql.push_str(" AND space = ?");
        args.push(Box::new(space.clone()));
    }
    if let Some(since) = filter.since {
        sql.push_str(" AND timestamp >= ?");
        args.push(Box::new(since));
    }
    sql.push_str(" ORDER BY timestamp DESC, validator");
    if let Some(limit) = filter.limit {
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

/// Latest summary per validator within one space (quality comparison).
pub fn latest_summary_per_validator(
    conn: &Connection,
    space: &str,
) -> Result<Vec<LintSummaryRecord>, StoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT s.id, s.execution_id, s.timestamp, s.validator, s.files_scanned,
                    s.total_violations, s.errors, s.warnings, s.info, s.by_code_json, s.space
             FROM lint_summaries s
             JOIN (SELECT validator, MAX(timestamp) AS ts
                   FROM lint_summaries WHERE space = ?1 GROUP BY validator) latest
               ON s.validator = latest.validator AND s.timestamp = latest.ts
             WHERE s.space = ?1
             ORDER BY s.validator",
        )
        .map_err(sqe)?;
    let rows = stmt.query_map(params![space], map_summary).map_err(sqe)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(sqe)?);
    }
    Ok(result)
}

/// Fetch one summary by its composite key.
pub fn get_summary(
    conn: &Connection,
    execution_id: &str,
    validator: &str,
) -> Result<Option<LintSummaryRecord>, StoreError> {
    conn.prepare_cached(
        "SELECT id, execution_id, timestamp, validator, files_scanned,
                total_violations, errors, warnings, info, by_code_json, space
         FROM lint_summaries WHERE execution_id = ?1 AND validator = ?2",
    )
    .map_err(sqe)?
    .query_row(params![execution_id, validator], map_summary)
    .optional()
    .map_err(sqe)
}

/// Count violations (test support).
pub fn count_violations(conn: &Connection) -> Result<i64, StoreError> {
    conn.query_row("SELECT COUNT(*) FROM lint_violations", [], |row| row.get(0))
        .map_err(sqe)
}

/// Count summaries (test support).
pub fn count_summaries(conn: &Connection) -> Result<i64, StoreError> {
    conn.query_row("SELECT COUNT(*) FROM lint_summaries", [], |row| row.get(0))
        .map_err(sqe)
}
