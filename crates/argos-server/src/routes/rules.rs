//! Execution rule CRUD.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use argos_core::ids;
use argos_core::types::rules::ExecutionRule;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub enabled_only: bool,
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ExecutionRule>>, ApiError> {
    Ok(Json(state.store.list_execution_rules(params.enabled_only)?))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ExecutionRule>, ApiError> {
    state
        .store
        .get_execution_rule(&name)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("rule {name}")))
}

pub async fn create(
    State(state): State<AppState>,
    Json(rule): Json<ExecutionRule>,
) -> Result<Json<ExecutionRule>, ApiError> {
    rule.validate().map_err(ApiError::bad_request)?;
    state.store.upsert_execution_rule(&rule, ids::now_unix())?;
    Ok(Json(rule))
}

pub async fn update(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(mut rule): Json<ExecutionRule>,
) -> Result<Json<ExecutionRule>, ApiError> {
    rule.name = name;
    rule.validate().map_err(ApiError::bad_request)?;
    state.store.upsert_execution_rule(&rule, ids::now_unix())?;
    Ok(Json(rule))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.store.delete_execution_rule(&name)? {
        return Err(ApiError::not_found(format!("rule {name}")));
    }
    Ok(Json(serde_json::json!({ "deleted": name })))
}
