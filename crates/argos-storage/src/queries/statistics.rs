//! entity_statistics table queries.
//!
//! Derived rollups; the statistics calculator supplies full recomputed
//! tuples, the store only upserts them.

use serde::Serialize;
use rusqlite::{params, Connection, OptionalExtension};

use argos_core::errors::StoreError;

use crate::connection::sqe;

/// Per-entity rollup over its execution history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityStatisticsRecord {
    pub entity_id: String,
    pub entity_type: String,
    pub total_runs: i64,
    pub passed: i64,
    pub failed: i64,
    pub skipped: i64,
    pub failure_rate: f64,
    pub avg_duration: f64,
    pub last_run: Option<i64>,
    pub last_failure: Option<i64>,
}

const SELECT_COLS: &str = "entity_id, entity_type, total_runs, passed, failed, skipped,
     failure_rate, avg_duration, last_run, last_failure";

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntityStatisticsRecord> {
    Ok(EntityStatisticsRecord {
        entity_id: row.get(0)?,
        entity_type: row.get(1)?,
        total_runs: row.get(2)?,
        passed: row.get(3)?,
        failed: row.get(4)?,
        skipped: row.get(5)?,
        failure_rate: row.get(6)?,
        avg_duration: row.get(7)?,
        last_run: row.get(8)?,
        last_failure: row.get(9)?,
    })
}

/// Replace the rollup for one entity.
pub fn upsert(conn: &Connection, row: &EntityStatisticsRecord) -> Result<(), StoreError> {
    conn.prepare_cached(
        "INSERT INTO entity_statistics
         (entity_id, entity_type, total_runs, passed, failed, skipped,
          failure_rate, avg_duration, last_run, last_failure)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT (entity_id) DO UPDATE SET
            entity_type = excluded.entity_type,
            total_runs = excluded.total_runs,
            passed = excluded.passed,
            failed = excluded.failed,
            skipped = excluded.skipped,
            failure_rate = excluded.failure_rate,
            avg_duration = excluded.avg_duration,
            last_run = excluded.last_run,
            last_failure = excluded.last_failure",
    )
    .map_err(sqe)?
    .execute(params![
        row.entity_id,
        row.entity_type,
        row.total_runs,
        row.passed,
        row.failed,
        row.skipped,
        row.failure_rate,
        row.avg_duration,
        row.last_run,
        row.last_failure,
    ])
    .map_err(sqe)?;
    Ok(())
}

/// Remove the rollup for an entity whose history is gone (retention).
pub fn delete(conn: &Connection, entity_id: &str) -> Result<bool, StoreError> {
    let n = conn
        .execute("DELETE FROM entity_statistics WHERE entity_id = ?1", params![entity_id])
        .map_err(sqe)?;
    Ok(n > 0)
}

/// Fetch the rollup for one entity.
pub fn get(conn: &Connection, entity_id: &str) -> Result<Option<EntityStatisticsRecord>, StoreError> {
    conn.prepare_cached(&format!(
        "SELECT {SELECT_COLS} FROM entity_statistics WHERE entity_id = ?1"
    ))
    .map_err(sqe)?
    .query_row(params![entity_id], map_row)
    .optional()
    .map_err(sqe)
}

/// All rollups of one entity type, ordered by entity id.
pub fn list_by_type(
    conn: &Connection,
    entity_type: &str,
) -> Result<Vec<EntityStatisticsRecord>, StoreError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {SELECT_COLS} FROM entity_statistics
             WHERE entity_type = ?1 ORDER BY entity_id"
        ))
        .map_err(sqe)?;
    let rows = stmt.query_map(params![entity_type], map_row).map_err(sqe)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(sqe)?);
    }
    Ok(result)
}

/// Count all rollups (test support).
pub fn count(conn: &Connection) -> Result<i64, StoreError> {
    conn.query_row("SELECT COUNT(*) FROM entity_statistics", [], |row| row.get(0))
        .map_err(sqe)
}
