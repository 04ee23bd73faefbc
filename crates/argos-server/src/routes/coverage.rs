//! Coverage summaries, per-file history, and regressions against a
//! baseline execution.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use argos_parsers::coverage::round2;
use argos_storage::queries::coverage::{
    CoverageHistoryFilter, CoverageHistoryRecord, CoverageSummaryRecord,
};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SummariesParams {
    pub space: Option<String>,
    pub limit: Option<usize>,
}

pub async fn summaries(
    State(state): State<AppState>,
    Query(params): Query<SummariesParams>,
) -> Result<Json<Vec<CoverageSummaryRecord>>, ApiError> {
    Ok(Json(state.store.get_coverage_summaries(
        params.space.as_deref(),
        Some(params.limit.unwrap_or(100).min(1_000)),
    )?))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub execution_id: Option<String>,
    pub file_path: Option<String>,
    pub space: Option<String>,
    pub limit: Option<usize>,
}

pub async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<CoverageHistoryRecord>>, ApiError> {
    let filter = CoverageHistoryFilter {
        execution_id: params.execution_id,
        file_path: params.file_path,
        space: params.space,
        limit: Some(params.limit.unwrap_or(500).min(5_000)),
    };
    Ok(Json(state.store.get_coverage_history(&filter)?))
}

#[derive(Debug, Deserialize)]
pub struct RegressionParams {
    pub current: String,
    pub baseline: String,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    1.0
}

#[derive(Debug, Serialize)]
pub struct RegressionRow {
    pub file_path: String,
    pub baseline: f64,
    pub current: f64,
    pub drop: f64,
}

pub async fn regressions(
    State(state): State<AppState>,
    Query(params): Query<RegressionParams>,
) -> Result<Json<Vec<RegressionRow>>, ApiError> {
    // Both executions must have a stored summary; per-file rows carry the
    // percentages being compared.
    for execution_id in [&params.current, &params.baseline] {
        if state.store.get_coverage_summary(execution_id)?.is_none() {
            return Err(ApiError::not_found(format!("coverage for {execution_id}")));
        }
    }

    let current = state.store.coverage_history_for_execution(&params.current)?;
    let baseline = state.store.coverage_history_for_execution(&params.baseline)?;

    let mut rows = Vec::new();
    for cur in &current {
        let Some(base) = baseline.iter().find(|b| b.file_path == cur.file_path) else {
            continue;
        };
        let drop = base.coverage_percentage - cur.coverage_percentage;
        if drop >= params.threshold {
            rows.push(RegressionRow {
                file_path: cur.file_path.clone(),
                baseline: base.coverage_percentage,
                current: cur.coverage_percentage,
                drop: round2(drop),
            });
        }
    }
    rows.sort_by(|a, b| {
        b.drop
            .partial_cmp(&a.drop)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.file_path.cmp(&b.file_path))
    });
    Ok(Json(rows))
}
