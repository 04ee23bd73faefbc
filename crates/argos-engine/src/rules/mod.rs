//! Rule engine: turns a named `ExecutionRule` into a concrete entity
//! selection. Evaluation is read-only and runs against one read snapshot.

use std::str::FromStr;

use rusqlite::Connection;

use argos_core::errors::StoreError;
use argos_core::types::entity::{entity_file_path, OutcomeStatus};
use argos_core::types::rules::{matches_any_group, ExecutionRule, RuleCriteria};
use argos_storage::queries::execution_history;
use argos_storage::ArgosStorageEngine;

use crate::error::EngineError;

/// A computed selection: the entities to run plus filters forwarded to
/// the runner adapter (marker/pattern rules narrow at runner level).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub entities: Vec<String>,
    pub marker: Option<String>,
    pub pattern: Option<String>,
}

impl Selection {
    /// A selection that translates to "run nothing".
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.marker.is_none() && self.pattern.is_none()
    }
}

/// Evaluate `rule` against the store. `changed_files` feeds the
/// `${CHANGED_FILES}` expansion. Pure with respect to store state: the
/// same state and rule always yield the same selection.
pub fn select(
    store: &ArgosStorageEngine,
    rule: &ExecutionRule,
    changed_files: &[String],
) -> Result<Selection, EngineError> {
    store
        .with_reader(|conn| {
            // One read transaction so every criteria sees one snapshot.
            conn.execute_batch("BEGIN").map_err(|e| StoreError::Sqlite {
                message: format!("begin read snapshot: {e}"),
            })?;
            let result = select_on(conn, rule, changed_files);
            let _ = conn.execute_batch("COMMIT");
            result
        })
        .map_err(EngineError::from)
}

fn select_on(
    conn: &Connection,
    rule: &ExecutionRule,
    changed_files: &[String],
) -> Result<Selection, StoreError> {
    let entity_type = rule.entity_type.as_str();

    match rule.criteria {
        RuleCriteria::All => {
            let mut entities = execution_history::distinct_entities(conn, entity_type, None)?;
            if !rule.groups.is_empty() {
                entities.retain(|e| candidate_matches(e, &rule.groups));
            }
            Ok(Selection { entities, ..Selection::default() })
        }

        RuleCriteria::Group => {
            let mut entities = execution_history::distinct_entities(conn, entity_type, None)?;
            entities.retain(|e| candidate_matches(e, &rule.groups));
            Ok(Selection { entities, ..Selection::default() })
        }

        RuleCriteria::FailedInLast => {
            let window = rule.window.max(1) as usize;
            let mut entities = Vec::new();
            for entity_id in execution_history::distinct_entities(conn, entity_type, None)? {
                if !rule.groups.is_empty() && !candidate_matches(&entity_id, &rule.groups) {
                    continue;
                }
                let rows =
                    execution_history::recent_for_entity(conn, &entity_id, None, Some(window))?;
                let failed = rows.iter().any(|r| {
                    OutcomeStatus::from_str(&r.status)
                        .unwrap_or(OutcomeStatus::Error)
                        .is_failure()
                });
                if failed {
                    entities.push(entity_id);
                }
            }
            Ok(Selection { entities, ..Selection::default() })
        }

        RuleCriteria::FailureRate => {
            let window = rule.window.max(1) as usize;
            let mut scored: Vec<(String, f64, usize)> = Vec::new();
            for entity_id in execution_history::distinct_entities(conn, entity_type, None)? {
                if !rule.groups.is_empty() && !candidate_matches(&entity_id, &rule.groups) {
                    continue;
                }
                let rows =
                    execution_history::recent_for_entity(conn, &entity_id, None, Some(window))?;
                if rows.is_empty() {
                    continue;
                }
                let failed = rows
                    .iter()
                    .filter(|r| {
                        OutcomeStatus::from_str(&r.status)
                            .unwrap_or(OutcomeStatus::Error)
                            .is_failure()
                    })
                    .count();
                let rate = failed as f64 / rows.len() as f64;
                if rate >= rule.threshold {
                    scored.push((entity_id, rate, rows.len()));
                }
            }
            // Highest rate first; ties by higher run count, then name.
            scored.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.2.cmp(&a.2))
                    .then_with(|| a.0.cmp(&b.0))
            });
            Ok(Selection {
                entities: scored.into_iter().map(|(e, _, _)| e).collect(),
                ..Selection::default()
            })
        }

        RuleCriteria::ChangedFiles => {
            let expanded = rule.expanded_groups(changed_files);
            let mut entities = Vec::new();
            if !expanded.is_empty() {
                for entity_id in execution_history::distinct_entities(conn, entity_type, None)? {
                    if candidate_matches(&entity_id, &expanded) {
                        entities.push(entity_id);
                    }
                }
            }
            Ok(Selection { entities, ..Selection::default() })
        }

        RuleCriteria::Marker | RuleCriteria::Pattern => {
            let mut entities = Vec::new();
            if !rule.groups.is_empty() {
                for entity_id in execution_history::distinct_entities(conn, entity_type, None)? {
                    if candidate_matches(&entity_id, &rule.groups) {
                        entities.push(entity_id);
                    }
                }
            }
            let marker = executor_str(rule, "marker");
            let pattern = executor_str(rule, "pattern");
            Ok(Selection { entities, marker, pattern })
        }
    }
}

/// An entity matches when its id or its derived file path matches any
/// group pattern.
fn candidate_matches(entity_id: &str, groups: &[String]) -> bool {
    matches_any_group(entity_id, groups)
        || matches_any_group(entity_file_path(entity_id), groups)
}

fn executor_str(rule: &ExecutionRule, key: &str) -> Option<String> {
    rule.executor
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}
