//! Per-validator lint comparison between the local and CI spaces.

use serde::Serialize;

use argos_core::errors::StoreError;
use argos_core::types::entity::Space;
use argos_storage::queries::lint::LintSummaryRecord;
use argos_storage::ArgosStorageEngine;

/// Violation totals of one validator in both spaces.
#[derive(Debug, Clone, Serialize)]
pub struct QualityDelta {
    pub validator: String,
    pub local_total: Option<i64>,
    pub ci_total: Option<i64>,
    /// local − ci; negative means local is cleaner.
    pub delta: i64,
    /// "↓" local cleaner, "↑" local worse, "=" equal or incomparable.
    pub direction: String,
}

fn totals(summaries: &[LintSummaryRecord], validator: &str) -> Option<i64> {
    summaries
        .iter()
        .find(|s| s.validator == validator)
        .map(|s| s.total_violations)
}

/// Latest local and CI lint summaries joined per validator. `validator`
/// narrows the comparison when given.
pub fn quality_comparison(
    store: &ArgosStorageEngine,
    validator: Option<&str>,
) -> Result<Vec<QualityDelta>, StoreError> {
    let local = store.latest_lint_summary_per_validator(Space::Local.as_str())?;
    let ci = store.latest_lint_summary_per_validator(Space::Ci.as_str())?;

    let mut validators: Vec<String> = local
        .iter()
        .chain(ci.iter())
        .map(|s| s.validator.clone())
        .collect();
    validators.sort();
    validators.dedup();
    if let Some(only) = validator {
        validators.retain(|v| v == only);
    }

    Ok(validators
        .into_iter()
        .map(|v| {
            let local_total = totals(&local, &v);
            let ci_total = totals(&ci, &v);
            let delta = local_total.unwrap_or(0) - ci_total.unwrap_or(0);
            let direction = match (local_total, ci_total) {
                (Some(l), Some(c)) if l < c => "↓".to_string(),
                (Some(l), Some(c)) if l > c => "↑".to_string(),
                _ => "=".to_string(),
            };
            QualityDelta {
                validator: v,
                local_total,
                ci_total,
                delta,
                direction,
            }
        })
        .collect())
}
