//! Statistics, flaky listing, and local-vs-CI comparison endpoints.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use argos_engine::stats;
use argos_storage::queries::statistics::EntityStatisticsRecord;

use crate::analytics;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_entity_type")]
    pub entity_type: String,
}

fn default_entity_type() -> String {
    "test".to_string()
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<EntityStatisticsRecord>>, ApiError> {
    Ok(Json(state.store.list_entity_statistics(&params.entity_type)?))
}

#[derive(Debug, Deserialize)]
pub struct EntityParams {
    pub entity_id: String,
    pub window: Option<usize>,
    pub space: Option<String>,
}

pub async fn entity(
    State(state): State<AppState>,
    Query(params): Query<EntityParams>,
) -> Result<Json<EntityStatisticsRecord>, ApiError> {
    // All-time, all-space asks read the stored rollup; windowed or
    // space-scoped asks recompute from history.
    if params.window.is_none() && params.space.is_none() {
        return state
            .store
            .get_entity_statistics(&params.entity_id)?
            .map(Json)
            .ok_or_else(|| ApiError::not_found(format!("entity {}", params.entity_id)));
    }

    let rows = state.store.recent_history_for_entity(
        &params.entity_id,
        params.space.as_deref(),
        params.window,
    )?;
    if rows.is_empty() {
        return Err(ApiError::not_found(format!("entity {}", params.entity_id)));
    }
    Ok(Json(stats::compute(&params.entity_id, &rows, params.window)))
}

#[derive(Debug, Deserialize)]
pub struct FlakyParams {
    pub threshold: f64,
    #[serde(default = "default_window")]
    pub window: usize,
    pub space: Option<String>,
}

fn default_window() -> usize {
    10
}

#[derive(Debug, Serialize)]
pub struct FlakyRow {
    pub entity_id: String,
    pub entity_type: String,
    pub failure_rate: f64,
    pub total_runs: i64,
    pub failed: i64,
    pub last_failure: Option<i64>,
}

pub async fn flaky(
    State(state): State<AppState>,
    Query(params): Query<FlakyParams>,
) -> Result<Json<Vec<FlakyRow>>, ApiError> {
    // threshold is open at the lower bound: 0.0 would make the bar
    // vacuous and return every entity.
    if params.threshold <= 0.0 || params.threshold > 1.0 {
        return Err(ApiError::bad_request("threshold must be within (0.0, 1.0]"));
    }
    if params.window < 2 {
        return Err(ApiError::bad_request("window must be >= 2"));
    }
    let rows = state.store.with_reader(|conn| {
        stats::flaky(conn, params.threshold, params.window, params.space.as_deref())
    })?;
    Ok(Json(
        rows.into_iter()
            .map(|f| FlakyRow {
                entity_id: f.entity_id,
                entity_type: f.entity_type,
                failure_rate: f.failure_rate,
                total_runs: f.total_runs,
                failed: f.failed,
                last_failure: f.last_failure,
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ComparisonParams {
    pub entity_id: String,
}

pub async fn comparison(
    State(state): State<AppState>,
    Query(params): Query<ComparisonParams>,
) -> Result<Json<analytics::EntityComparison>, ApiError> {
    Ok(Json(analytics::compare_entity(&state.store, &params.entity_id)?))
}

pub async fn platform_failures(
    State(state): State<AppState>,
) -> Result<Json<Vec<analytics::PlatformFailure>>, ApiError> {
    Ok(Json(analytics::platform_failures(&state.store)?))
}
