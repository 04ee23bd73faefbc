//! Statistics calculator: per-entity rollups over execution history.
//!
//! Deterministic function of the history rows. The stored
//! `entity_statistics` table holds the all-time, all-space rollup;
//! windowed or space-scoped figures are computed on demand from the same
//! fold.

use std::str::FromStr;

use rusqlite::Connection;

use argos_core::errors::StoreError;
use argos_core::types::entity::OutcomeStatus;
use argos_storage::queries::execution_history::{self, ExecutionHistoryRecord};
use argos_storage::queries::statistics::{self, EntityStatisticsRecord};

/// Fold history rows (most recent first) into a rollup. `window` limits
/// the fold to the most recent N rows; `None` means all-time.
///
/// ERROR rows count into `failed`: both are failures for rate purposes.
pub fn compute(
    entity_id: &str,
    rows: &[ExecutionHistoryRecord],
    window: Option<usize>,
) -> EntityStatisticsRecord {
    let considered: &[ExecutionHistoryRecord] = match window {
        Some(w) => &rows[..rows.len().min(w)],
        None => rows,
    };

    let mut passed = 0i64;
    let mut failed = 0i64;
    let mut skipped = 0i64;
    let mut duration_sum = 0.0f64;
    let mut last_run: Option<i64> = None;
    let mut last_failure: Option<i64> = None;

    for row in considered {
        let status = OutcomeStatus::from_str(&row.status).unwrap_or(OutcomeStatus::Error);
        match status {
            OutcomeStatus::Passed => passed += 1,
            OutcomeStatus::Skipped => skipped += 1,
            OutcomeStatus::Failed | OutcomeStatus::Error => failed += 1,
        }
        if status.is_failure() && last_failure.is_none() {
            last_failure = Some(row.timestamp);
        }
        if last_run.is_none() {
            last_run = Some(row.timestamp);
        }
        duration_sum += row.duration_seconds;
    }

    let total_runs = considered.len() as i64;
    let failure_rate = if total_runs > 0 {
        failed as f64 / total_runs as f64
    } else {
        0.0
    };
    let avg_duration = if total_runs > 0 {
        duration_sum / total_runs as f64
    } else {
        0.0
    };

    EntityStatisticsRecord {
        entity_id: entity_id.to_string(),
        entity_type: considered
            .first()
            .map(|r| r.entity_type.clone())
            .unwrap_or_else(|| "test".to_string()),
        total_runs,
        passed,
        failed,
        skipped,
        failure_rate,
        avg_duration,
        last_run,
        last_failure,
    }
}

/// Recompute and persist the rollups for the given entities inside the
/// caller's transaction. Entities with no remaining history lose their
/// rollup row (retention cascade).
pub fn recompute_entities(conn: &Connection, entity_ids: &[String]) -> Result<(), StoreError> {
    for entity_id in entity_ids {
        let rows = execution_history::recent_for_entity(conn, entity_id, None, None)?;
        if rows.is_empty() {
            statistics::delete(conn, entity_id)?;
        } else {
            statistics::upsert(conn, &compute(entity_id, &rows, None))?;
        }
    }
    Ok(())
}

/// A flaky entity with its windowed figures.
#[derive(Debug, Clone, PartialEq)]
pub struct FlakyEntity {
    pub entity_id: String,
    pub entity_type: String,
    pub failure_rate: f64,
    pub total_runs: i64,
    pub failed: i64,
    pub last_failure: Option<i64>,
}

/// Entities whose windowed failure rate meets `threshold` with enough
/// runs, sorted by descending rate then descending run count.
pub fn flaky(
    conn: &Connection,
    threshold: f64,
    window: usize,
    space: Option<&str>,
) -> Result<Vec<FlakyEntity>, StoreError> {
    let min_runs = min_runs_for_window(window);
    let mut out = Vec::new();

    for entity_type in ["test", "lint-file", "coverage-file", "ci-job"] {
        for entity_id in execution_history::distinct_entities(conn, entity_type, space)? {
            let rows = execution_history::recent_for_entity(conn, &entity_id, space, Some(window))?;
            let stats = compute(&entity_id, &rows, Some(window));
            if stats.failure_rate >= threshold && stats.total_runs >= min_runs {
                out.push(FlakyEntity {
                    entity_id: stats.entity_id,
                    entity_type: stats.entity_type,
                    failure_rate: stats.failure_rate,
                    total_runs: stats.total_runs,
                    failed: stats.failed,
                    last_failure: stats.last_failure,
                });
            }
        }
    }

    out.sort_by(|a, b| {
        b.failure_rate
            .partial_cmp(&a.failure_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.total_runs.cmp(&a.total_runs))
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
    Ok(out)
}

/// `max(2, window/2)` capped at the window itself; a window of 1 keeps
/// the bar at 1 run.
fn min_runs_for_window(window: usize) -> i64 {
    std::cmp::max(2, window / 2).min(window.max(1)) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, ts: i64, duration: f64) -> ExecutionHistoryRecord {
        ExecutionHistoryRecord {
            id: 0,
            entity_id: "t.py::x".to_string(),
            entity_type: "test".to_string(),
            execution_id: format!("local-{ts}"),
            timestamp: ts,
            status: status.to_string(),
            duration_seconds: duration,
            space: "local".to_string(),
            metadata_json: None,
        }
    }

    #[test]
    fn computes_counts_and_rate() {
        // Most recent first.
        let rows = vec![
            row("PASSED", 30, 0.3),
            row("FAILED", 20, 0.2),
            row("SKIPPED", 10, 0.1),
        ];
        let stats = compute("t.py::x", &rows, None);
        assert_eq!(stats.total_runs, 3);
        assert_eq!(stats.passed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 1);
        assert!((stats.failure_rate - 1.0 / 3.0).abs() < 1e-9);
        assert!((stats.avg_duration - 0.2).abs() < 1e-9);
        assert_eq!(stats.last_run, Some(30));
        assert_eq!(stats.last_failure, Some(20));
    }

    #[test]
    fn window_limits_the_fold() {
        let rows = vec![row("PASSED", 40, 0.1), row("PASSED", 30, 0.1), row("FAILED", 20, 0.1)];
        let stats = compute("t.py::x", &rows, Some(2));
        assert_eq!(stats.total_runs, 2);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.failure_rate, 0.0);
    }

    #[test]
    fn error_counts_as_failure() {
        let rows = vec![row("ERROR", 10, 0.0)];
        let stats = compute("t.py::x", &rows, None);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.failure_rate, 1.0);
        assert_eq!(stats.last_failure, Some(10));
    }

    #[test]
    fn empty_history_is_all_zero() {
        let stats = compute("t.py::x", &[], None);
        assert_eq!(stats.total_runs, 0);
        assert_eq!(stats.failure_rate, 0.0);
        assert_eq!(stats.last_run, None);
    }

    #[test]
    fn min_runs_bar() {
        assert_eq!(min_runs_for_window(1), 1);
        assert_eq!(min_runs_for_window(2), 2);
        assert_eq!(min_runs_for_window(4), 2);
        assert_eq!(min_runs_for_window(10), 5);
    }
}
