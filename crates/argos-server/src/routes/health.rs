//! Health endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub schema_version: u32,
    pub writers_queued: usize,
}

pub async fn health(State(state): State<AppState>) -> Result<Json<Health>, ApiError> {
    let schema_version = state.store.schema_version()?;
    Ok(Json(Health {
        status: "ok",
        schema_version,
        writers_queued: state.store.writers_queued(),
    }))
}
