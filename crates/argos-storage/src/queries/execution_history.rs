//! execution_history table queries.
//!
//! Append-only log of per-entity outcomes. `(entity_id, execution_id)` is
//! unique; ordering for "most recent first" is `(timestamp, execution_id)`
//! descending so same-second rows stay deterministic.

use serde::Serialize;
use rusqlite::{params, Connection};

use argos_core::errors::StoreError;

use crate::connection::sqe;

/// One entity outcome from one execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionHistoryRecord {
    pub id: i64,
    pub entity_id: String,
    pub entity_type: String,
    pub execution_id: String,
    pub timestamp: i64,
    pub status: String,
    pub duration_seconds: f64,
    pub space: String,
    pub metadata_json: Option<String>,
}

/// Fields for inserting a new outcome row. `id` is assigned by SQLite.
#[derive(Debug, Clone)]
pub struct NewExecutionHistory {
    pub entity_id: String,
    pub entity_type: String,
    pub execution_id: String,
    pub timestamp: i64,
    pub status: String,
    pub duration_seconds: f64,
    pub space: String,
    pub metadata_json: Option<String>,
}

/// Filter for history reads. All fields optional; rows come back most
/// recent first.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub entity_id: Option<String>,
    pub entity_type: Option<String>,
    pub execution_id: Option<String>,
    pub space: Option<String>,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub limit: Option<usize>,
}

const SELECT_COLS: &str = "id, entity_id, entity_type, execution_id, timestamp, status,
     duration_seconds, space, metadata_json";

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExecutionHistoryRecord> {
    Ok(ExecutionHistoryRecord {
        id: row.get(0)?,
        entity_id: row.get(1)?,
        entity_type: row.get(2)?,
        execution_id: row.get(3)?,
        timestamp: row.get(4)?,
        status: row.get(5)?,
        duration_seconds: row.get(6)?,
        space: row.get(7)?,
        metadata_json: row.get(8)?,
    })
}

/// Insert one outcome row. Fails with `Constraint` on a duplicate
/// `(entity_id, execution_id)` pair.
pub fn insert(conn: &Connection, row: &NewExecutionHistory) -> Result<i64, StoreError> {
    conn.prepare_cached(
        "INSERT INTO execution_history
         (entity_id, entity_type, execution_id, timestamp, status,
          duration_seconds, space, metadata_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .map_err(sqe)?
    .execute(params![
        row.entity_id,
        row.entity_type,
        row.execution_id,
        row.timestamp,
        row.status,
        row.duration_seconds,
        row.space,
        row.metadata_json,
    ])
    .map_err(sqe)?;
    Ok(conn.last_insert_rowid())
}

/// Insert one outcome row, ignoring duplicates. Returns whether a row was
/// actually written. Used by CI re-ingest so repeated ingests converge.
pub fn insert_dedupe(conn: &Connection, row: &NewExecutionHistory) -> Result<bool, StoreError> {
    let changed = conn
        .prepare_cached(
            "INSERT OR IGNORE INTO execution_history
             (entity_id, entity_type, execution_id, timestamp, status,
              duration_seconds, space, metadata_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .map_err(sqe)?
        .execute(params![
            row.entity_id,
            row.entity_type,
            row.execution_id,
            row.timestamp,
            row.status,
            row.duration_seconds,
            row.space,
            row.metadata_json,
        ])
        .map_err(sqe)?;
    Ok(changed > 0)
}

/// Filtered history read, most recent first.
pub fn query(
    conn: &Connection,
    filter: &HistoryFilter,
) -> Result<Vec<ExecutionHistoryRecord>, StoreError> {
    let mut sql = format!("SELECT {SELECT_COLS} FROM execution_history WHERE 1=1");
    let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(entity_id) = &filter.entity_id {
        sql.push_str(" AND entity_id = ?");
        args.push(Box::new(entity_id.clone()));
    }
    if let Some(entity_type) = &filter.entity_type {
        sql.push_str(" AND entity_type = ?");
        args.push(Box::new(entity_type.clone()));
    }
    if let Some(execution_id) = &filter.execution_id {
        sql.push_str(" AND execution_id = ?");
        args.push(Box::new(execution_id.clone()));
    }
    if let Some(space) = &filter.space {
        sql.push_str(" AND space = ?");
        args.push(Box::new(space.clone()));
    }
    if let Some(since) = filter.since {
        sql.push_str(" AND timestamp >= ?");
        args.push(Box::new(since));
    }
    if let Some(until) = filter.until {
        sql.push_str(" AND timestamp <= ?");
        args.push(Box::new(until));
    }
    sql.push_str(" ORDER BY timestamp DESC, execution_id DESC, id DESC");
    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ?");
        args.push(Box::new(limit as i64));
    }

    let mut stmt = conn.prepare(&sql).map_err(sqe)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())), map_row)
        .map_err(sqe)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(sqe)?);
    }
    Ok(result)
}

/// Most recent rows for one entity, optionally space-scoped and windowed.
pub fn recent_for_entity(
    conn: &Connection,
    entity_id: &str,
    space: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<ExecutionHistoryRecord>, StoreError> {
    query(
        conn,
        &HistoryFilter {
            entity_id: Some(entity_id.to_string()),
            space: space.map(str::to_string),
            limit,
            ..HistoryFilter::default()
        },
    )
}

/// Distinct entity ids of one type, optionally space-scoped, ordered.
pub fn distinct_entities(
    conn: &Connection,
    entity_type: &str,
    space: Option<&str>,
) -> Result<Vec<String>, StoreError> {
    let space_val: &str = space.unwrap_or_default();
    let (sql, args): (&str, Vec<&dyn rusqlite::types::ToSql>) = if space.is_some() {
        (
            "SELECT DISTINCT entity_id FROM execution_history
             WHERE entity_type = ?1 AND space = ?2 ORDER BY entity_id",
            vec![&entity_type as &dyn rusqlite::types::ToSql, &space_val as &dyn rusqlite::types::ToSql],
        )
    } else {
        (
            "SELECT DISTINCT entity_id FROM execution_history
             WHERE entity_type = ?1 ORDER BY entity_id",
            vec![&entity_type as &dyn rusqlite::types::ToSql],
        )
    };

    let mut stmt = conn.prepare_cached(sql).map_err(sqe)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(args), |row| row.get::<_, String>(0))
        .map_err(sqe)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(sqe)?);
    }
    Ok(result)
}

/// Entity ids with at least one row older than `cutoff` (prune planning).
pub fn entities_older_than(conn: &Connection, cutoff: i64) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT DISTINCT entity_id FROM execution_history WHERE timestamp < ?1",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map(params![cutoff], |row| row.get::<_, String>(0))
        .map_err(sqe)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(sqe)?);
    }
    Ok(result)
}

/// Delete rows older than `cutoff`. Returns the number removed.
pub fn delete_older_than(conn: &Connection, cutoff: i64) -> Result<usize, StoreError> {
    conn.execute(
        "DELETE FROM execution_history WHERE timestamp < ?1",
        params![cutoff],
    )
    .map_err(sqe)
}

/// Count all rows (test support).
pub fn count(conn: &Connection) -> Result<i64, StoreError> {
    conn.query_row("SELECT COUNT(*) FROM execution_history", [], |row| row.get(0))
        .map_err(sqe)
}
