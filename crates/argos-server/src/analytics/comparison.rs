//! Local-vs-CI comparison for test entities.
//!
//! CI rows carry their platform (the job's runner OS) in the row
//! metadata; the comparison takes the most recent outcome per platform
//! and flags disagreement with the most recent local outcome.

use std::collections::BTreeMap;

use serde::Serialize;

use argos_core::errors::StoreError;
use argos_core::types::entity::Space;
use argos_storage::queries::execution_history::ExecutionHistoryRecord;
use argos_storage::ArgosStorageEngine;

/// How many CI rows per entity the platform grouping inspects.
const CI_LOOKBACK_ROWS: usize = 200;

/// Comparison of one entity across spaces.
#[derive(Debug, Clone, Serialize)]
pub struct EntityComparison {
    pub entity_id: String,
    /// Most recent local outcome, if any.
    pub local: Option<String>,
    /// Most recent CI outcome per platform.
    pub ci_by_platform: BTreeMap<String, String>,
    /// True when any platform's outcome differs from the local one.
    pub disagreement: bool,
}

/// One entity failing on specific CI platforms while passing locally.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformFailure {
    pub entity_id: String,
    pub platforms: Vec<String>,
    pub last_ci_failure: i64,
}

fn platform_of(row: &ExecutionHistoryRecord) -> String {
    row.metadata_json
        .as_deref()
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
        .and_then(|v| v.get("platform").and_then(|p| p.as_str()).map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Most recent CI outcome per platform, from the entity's recent CI rows.
fn ci_outcomes_by_platform(
    store: &ArgosStorageEngine,
    entity_id: &str,
) -> Result<BTreeMap<String, (String, i64)>, StoreError> {
    let rows = store.recent_history_for_entity(
        entity_id,
        Some(Space::Ci.as_str()),
        Some(CI_LOOKBACK_ROWS),
    )?;

    let mut by_platform: BTreeMap<String, (String, i64)> = BTreeMap::new();
    for row in rows {
        // Rows are most recent first; keep the first per platform.
        by_platform
            .entry(platform_of(&row))
            .or_insert((row.status.clone(), row.timestamp));
    }
    Ok(by_platform)
}

/// Compare one entity's last local outcome with its last CI outcome per
/// platform.
pub fn compare_entity(
    store: &ArgosStorageEngine,
    entity_id: &str,
) -> Result<EntityComparison, StoreError> {
    let local = store
        .recent_history_for_entity(entity_id, Some(Space::Local.as_str()), Some(1))?
        .into_iter()
        .next()
        .map(|row| row.status);

    let ci = ci_outcomes_by_platform(store, entity_id)?;
    let ci_by_platform: BTreeMap<String, String> =
        ci.into_iter().map(|(platform, (status, _))| (platform, status)).collect();

    let disagreement = match &local {
        Some(local_status) => ci_by_platform.values().any(|s| s != local_status),
        // No local baseline: CI-only results are not a disagreement.
        None => false,
    };

    Ok(EntityComparison {
        entity_id: entity_id.to_string(),
        local,
        ci_by_platform,
        disagreement,
    })
}

/// Entities whose most recent CI outcome is FAILED on at least one
/// platform while the most recent local outcome is PASSED, most recent CI
/// failure first.
pub fn platform_failures(store: &ArgosStorageEngine) -> Result<Vec<PlatformFailure>, StoreError> {
    let mut out = Vec::new();

    for entity_id in store.distinct_entities("test", Some(Space::Ci.as_str()))? {
        let local_passed = store
            .recent_history_for_entity(&entity_id, Some(Space::Local.as_str()), Some(1))?
            .first()
            .map(|row| row.status == "PASSED")
            .unwrap_or(false);
        if !local_passed {
            continue;
        }

        let ci = ci_outcomes_by_platform(store, &entity_id)?;
        let mut platforms: Vec<String> = Vec::new();
        let mut last_failure = 0i64;
        for (platform, (status, ts)) in ci {
            if status == "FAILED" || status == "ERROR" {
                platforms.push(platform);
                last_failure = last_failure.max(ts);
            }
        }
        if !platforms.is_empty() {
            out.push(PlatformFailure {
                entity_id,
                platforms,
                last_ci_failure: last_failure,
            });
        }
    }

    out.sort_by(|a, b| {
        b.last_ci_failure
            .cmp(&a.last_ci_failure)
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
    Ok(out)
}
