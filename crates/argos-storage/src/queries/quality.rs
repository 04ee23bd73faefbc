//! code_quality_metrics table queries.
//!
//! Rollup per `(file_path, validator)`, recomputed from the lint tables
//! after every lint ingest.

use serde::Serialize;
use rusqlite::{params, Connection, OptionalExtension};

use argos_core::errors::StoreError;

use crate::connection::sqe;

#[derive(Debug, Clone, Serialize)]
pub struct CodeQualityMetricsRecord {
    pub file_path: String,
    pub validator: String,
    pub total_scans: i64,
    pub total_violations: i64,
    pub avg_violations_per_scan: f64,
    pub most_common_code: Option<String>,
    pub last_scan: Option<i64>,
    pub last_violation: Option<i64>,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CodeQualityMetricsRecord> {
    Ok(CodeQualityMetricsRecord {
        file_path: row.get(0)?,
        validator: row.get(1)?,
        total_scans: row.get(2)?,
        total_violations: row.get(3)?,
        avg_violations_per_scan: row.get(4)?,
        most_common_code: row.get(5)?,
        last_scan: row.get(6)?,
        last_violation: row.get(7)?,
    })
}

/// Recompute and upsert the rollup for one `(file_path, validator)` pair
/// from the lint tables.
///
/// total_scans counts the validator's summaries (every scan covers every
/// file the validator looked at); violation aggregates come from the file's
/// own rows.
pub fn recompute_and_upsert(
    conn: &Connection,
    file_path: &str,
    validator: &str,
) -> Result<(), StoreError> {
    let total_scans: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM lint_summaries WHERE validator = ?1",
            params![validator],
            |row| row.get(0),
        )
        .map_err(sqe)?;

    let (total_violations, last_violation): (i64, Option<i64>) = conn
        .query_row(
            "SELECT COUNT(*), MAX(timestamp) FROM lint_violations
             WHERE file_path = ?1 AND validator = ?2",
            params![file_path, validator],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(sqe)?;

    let most_common_code: Option<String> = conn
        .query_row(
            "SELECT code FROM lint_violations
             WHERE file_path = ?1 AND validator = ?2
             GROUP BY code ORDER BY COUNT(*) DESC, code LIMIT 1",
            params![file_path, validator],
            |row| row.get(0),
        )
        .optional()
        .map_err(sqe)?;

    let last_scan: Option<i64> = conn
        .query_row(
            "SELECT MAX(timestamp) FROM lint_summaries WHERE validator = ?1",
            params![validator],
            |row| row.get(0),
        )
        .map_err(sqe)?;

    let avg = if total_scans > 0 {
        total_violations as f64 / total_scans as f64
    } else {
        0.0
    };

    conn.prepare_cached(
        "INSERT INTO code_quality_metrics
         (file_path, validator, total_scans, total_violations,
          avg_violations_per_scan, most_common_code, last_scan, last_violation)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT (file_path, validator) DO UPDATE SET
            total_scans = excluded.total_scans,
            total_violations = excluded.total_violations,
            avg_violations_per_scan = excluded.avg_violations_per_scan,
            most_common_code = excluded.most_common_code,
            last_scan = excluded.last_scan,
            last_violation = excluded.last_violation",
    )
    .map_err(sqe)?
    .execute(params![
        file_path,
        validator,
        total_scans,
        total_violations,
        avg,
        most_common_code,
        last_scan,
        last_violation,
    ])
    .map_err(sqe)?;
    Ok(())
}

/// Fetch the rollup for one pair.
pub fn get(
    conn: &Connection,
    file_path: &str,
    validator: &str,
) -> Result<Option<CodeQualityMetricsRecord>, StoreError> {
    conn.prepare_cached(
        "SELECT file_path, validator, total_scans, total_violations,
                avg_violations_per_scan, most_common_code, last_scan, last_violation
         FROM code_quality_metrics WHERE file_path = ?1 AND validator = ?2",
    )
    .map_err(sqe)?
    .query_row(params![file_path, validator], map_row)
    .optional()
    .map_err(sqe)
}

/// Worst files by violation count for one validator.
pub fn worst_files(
    conn: &Connection,
    validator: &str,
    limit: usize,
) -> Result<Vec<CodeQualityMetricsRecord>, StoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT file_path, validator, total_scans, total_violations,
                    avg_violations_per_scan, most_common_code, last_scan, last_violation
             FROM code_quality_metrics WHERE validator = ?1
             ORDER BY total_violations DESC, file_path LIMIT ?2",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map(params![validator, limit as i64], map_row)
        .map_err(sqe)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(sqe)?);
    }
    Ok(result)
}
