//! Execution history reads, rule-driven dispatch, cancellation, and the
//! per-execution progress WebSocket.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

use argos_engine::execution::ProgressEvent;
use argos_storage::queries::execution_history::{ExecutionHistoryRecord, HistoryFilter};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub entity_id: Option<String>,
    pub entity_type: Option<String>,
    pub execution_id: Option<String>,
    pub space: Option<String>,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub limit: Option<usize>,
}

impl HistoryParams {
    fn into_filter(self) -> HistoryFilter {
        HistoryFilter {
            entity_id: self.entity_id,
            entity_type: self.entity_type,
            execution_id: self.execution_id,
            space: self.space,
            since: self.since,
            until: self.until,
            limit: Some(self.limit.unwrap_or(100).min(1_000)),
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<ExecutionHistoryRecord>>, ApiError> {
    let rows = state.store.get_execution_history(&params.into_filter())?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub rule_name: String,
    pub execution_id: Option<String>,
    #[serde(default)]
    pub changed_files: Vec<String>,
    #[serde(default)]
    pub coverage: bool,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub execution_id: String,
    pub ws_url: String,
}

pub async fn start(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    // Fail fast on unknown rules so the caller gets 404 instead of a
    // failed execution stream.
    if state.store.get_execution_rule(&request.rule_name)?.is_none() {
        return Err(ApiError::not_found(format!("rule {}", request.rule_name)));
    }

    let execution_id = state.dispatch_execution(
        request.rule_name,
        request.execution_id,
        request.changed_files,
        request.coverage,
    );
    let ws_url = format!("/api/executions/{execution_id}/ws");
    Ok(Json(StartResponse { execution_id, ws_url }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub execution_id: String,
    pub latest: Option<ProgressEvent>,
    pub summary: Option<argos_engine::ExecutionSummary>,
}

pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let handle = state
        .execution(&id)
        .ok_or_else(|| ApiError::not_found(format!("execution {id}")))?;
    let latest = handle.latest.lock().unwrap_or_else(|e| e.into_inner()).clone();
    let summary = handle.summary.lock().unwrap_or_else(|e| e.into_inner()).clone();
    Ok(Json(StatusResponse {
        execution_id: id,
        latest,
        summary,
    }))
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub execution_id: String,
    pub cancelled: bool,
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    if state.execution(&id).is_none() {
        return Err(ApiError::not_found(format!("execution {id}")));
    }
    let cancelled = state.cancel_execution(&id);
    Ok(Json(CancelResponse {
        execution_id: id,
        cancelled,
    }))
}

pub async fn ws(
    State(state): State<AppState>,
    Path(id): Path<String>,
    upgrade: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let handle = state
        .execution(&id)
        .ok_or_else(|| ApiError::not_found(format!("execution {id}")))?;
    let rx = handle.progress.subscribe();
    let latest = handle.latest.lock().unwrap_or_else(|e| e.into_inner()).clone();

    Ok(upgrade.on_upgrade(move |socket| stream_progress(socket, latest, rx)))
}

async fn stream_progress(
    mut socket: WebSocket,
    latest: Option<ProgressEvent>,
    mut rx: tokio::sync::broadcast::Receiver<ProgressEvent>,
) {
    // Late subscribers first see the most recent frame; if the execution
    // already hit a terminal stage, that is all they get.
    if let Some(event) = latest {
        let terminal = event.stage.is_terminal();
        if send_event(&mut socket, &event).await.is_err() || terminal {
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    }

    loop {
        match rx.recv().await {
            Ok(event) => {
                let terminal = event.stage.is_terminal();
                if send_event(&mut socket, &event).await.is_err() {
                    return;
                }
                if terminal {
                    break;
                }
            }
            // Lag drops the oldest progress frames only; the terminal
            // frame is the newest and still arrives.
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "progress subscriber lagged");
                continue;
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
    let _ = socket.send(Message::Close(None)).await;
}

async fn send_event(socket: &mut WebSocket, event: &ProgressEvent) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    socket.send(Message::Text(payload.into())).await
}
