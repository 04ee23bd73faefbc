//! execution_rules table queries.

use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};

use argos_core::errors::StoreError;
use argos_core::types::entity::EntityType;
use argos_core::types::rules::{ExecutionRule, RuleCriteria};

use crate::connection::sqe;

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, bool, String, u32, f64, String, String, String)> {
    Ok((
        row.get(0)?,
        row.get::<_, i64>(1)? != 0,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn decode(
    (name, enabled, criteria, window, threshold, entity_type, groups_json, executor_json): (
        String,
        bool,
        String,
        u32,
        f64,
        String,
        String,
        String,
    ),
) -> Result<ExecutionRule, StoreError> {
    let criteria = RuleCriteria::from_str(&criteria).map_err(|e| StoreError::Corruption {
        details: format!("execution_rules.criteria: {e}"),
    })?;
    let entity_type = EntityType::from_str(&entity_type).map_err(|e| StoreError::Corruption {
        details: format!("execution_rules.entity_type: {e}"),
    })?;
    let groups: Vec<String> =
        serde_json::from_str(&groups_json).map_err(|e| StoreError::Corruption {
            details: format!("execution_rules.groups_json: {e}"),
        })?;
    let executor: serde_json::Value =
        serde_json::from_str(&executor_json).map_err(|e| StoreError::Corruption {
            details: format!("execution_rules.executor_json: {e}"),
        })?;
    Ok(ExecutionRule {
        name,
        enabled,
        criteria,
        window,
        threshold,
        groups,
        executor,
        entity_type,
    })
}

const SELECT_COLS: &str =
    "name, enabled, criteria, window, threshold, entity_type, groups_json, executor_json";

/// Insert a rule or replace an existing one of the same name.
pub fn upsert(conn: &Connection, rule: &ExecutionRule, now: i64) -> Result<(), StoreError> {
    let groups_json = serde_json::to_string(&rule.groups).map_err(|e| StoreError::Sqlite {
        message: format!("encode groups: {e}"),
    })?;
    let executor_json = serde_json::to_string(&rule.executor).map_err(|e| StoreError::Sqlite {
        message: format!("encode executor: {e}"),
    })?;

    conn.prepare_cached(
        "INSERT INTO execution_rules
         (name, enabled, criteria, window, threshold, entity_type, groups_json, executor_json, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT (name) DO UPDATE SET
            enabled = excluded.enabled,
            criteria = excluded.criteria,
            window = excluded.window,
            threshold = excluded.threshold,
            entity_type = excluded.entity_type,
            groups_json = excluded.groups_json,
            executor_json = excluded.executor_json,
            updated_at = excluded.updated_at",
    )
    .map_err(sqe)?
    .execute(params![
        rule.name,
        rule.enabled as i64,
        rule.criteria.as_str(),
        rule.window,
        rule.threshold,
        rule.entity_type.as_str(),
        groups_json,
        executor_json,
        now,
    ])
    .map_err(sqe)?;
    Ok(())
}

/// Delete a rule by name. Returns whether a row was removed.
pub fn delete(conn: &Connection, name: &str) -> Result<bool, StoreError> {
    let n = conn
        .execute("DELETE FROM execution_rules WHERE name = ?1", params![name])
        .map_err(sqe)?;
    Ok(n > 0)
}

/// Fetch one rule by name.
pub fn get(conn: &Connection, name: &str) -> Result<Option<ExecutionRule>, StoreError> {
    let raw = conn
        .prepare_cached(&format!(
            "SELECT {SELECT_COLS} FROM execution_rules WHERE name = ?1"
        ))
        .map_err(sqe)?
        .query_row(params![name], map_row)
        .optional()
        .map_err(sqe)?;
    raw.map(decode).transpose()
}

/// List rules ordered by name.
pub fn list(conn: &Connection, enabled_only: bool) -> Result<Vec<ExecutionRule>, StoreError> {
    let sql = if enabled_only {
        format!("SELECT {SELECT_COLS} FROM execution_rules WHERE enabled = 1 ORDER BY name")
    } else {
        format!("SELECT {SELECT_COLS} FROM execution_rules ORDER BY name")
    };
    let mut stmt = conn.prepare(&sql).map_err(sqe)?;
    let rows = stmt.query_map([], map_row).map_err(sqe)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(decode(row.map_err(sqe)?)?);
    }
    Ok(result)
}
