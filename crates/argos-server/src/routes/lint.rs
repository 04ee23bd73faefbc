//! Lint summaries, violations, and the local-vs-CI quality comparison.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use argos_storage::queries::lint::{
    LintSummaryFilter, LintSummaryRecord, LintViolationFilter, LintViolationRecord,
};

use crate::analytics;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SummariesParams {
    pub execution_id: Option<String>,
    pub validator: Option<String>,
    pub space: Option<String>,
    pub since: Option<i64>,
    pub limit: Option<usize>,
}

pub async fn summaries(
    State(state): State<AppState>,
    Query(params): Query<SummariesParams>,
) -> Result<Json<Vec<LintSummaryRecord>>, ApiError> {
    let filter = LintSummaryFilter {
        execution_id: params.execution_id,
        validator: params.validator,
        space: params.space,
        since: params.since,
        limit: Some(params.limit.unwrap_or(100).min(1_000)),
    };
    Ok(Json(state.store.get_lint_summaries(&filter)?))
}

#[derive(Debug, Deserialize)]
pub struct ViolationsParams {
    pub execution_id: Option<String>,
    pub validator: Option<String>,
    pub file_path: Option<String>,
    pub severity: Option<String>,
    pub space: Option<String>,
    pub limit: Option<usize>,
}

pub async fn violations(
    State(state): State<AppState>,
    Query(params): Query<ViolationsParams>,
) -> Result<Json<Vec<LintViolationRecord>>, ApiError> {
    let filter = LintViolationFilter {
        execution_id: params.execution_id,
        validator: params.validator,
        file_path: params.file_path,
        severity: params.severity,
        space: params.space,
        limit: Some(params.limit.unwrap_or(500).min(5_000)),
    };
    Ok(Json(state.store.get_lint_violations(&filter)?))
}

#[derive(Debug, Deserialize)]
pub struct ComparisonParams {
    pub validator: Option<String>,
}

pub async fn comparison(
    State(state): State<AppState>,
    Query(params): Query<ComparisonParams>,
) -> Result<Json<Vec<analytics::QualityDelta>>, ApiError> {
    Ok(Json(analytics::quality_comparison(
        &state.store,
        params.validator.as_deref(),
    )?))
}
