//! Report endpoints: assemble renderer inputs from the store, then hand
//! off to the pure renderers.

use axum::extract::{Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::error::ApiError;
use crate::reports::{self, assemble, ReportFormat};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportParams {
    pub format: Option<String>,
    /// Coverage report: baseline execution id for the regression list.
    pub baseline: Option<String>,
    /// Flaky section tuning (test report) or regression threshold in
    /// percent points (coverage report).
    pub threshold: Option<f64>,
    pub window: Option<usize>,
}

fn format_of(params: &ReportParams) -> Result<ReportFormat, ApiError> {
    params
        .format
        .as_deref()
        .unwrap_or("html")
        .parse()
        .map_err(ApiError::bad_request)
}

fn respond(format: ReportFormat, content: String) -> Response {
    let content_type = match format {
        ReportFormat::Html => "text/html; charset=utf-8",
        ReportFormat::Markdown => "text/markdown; charset=utf-8",
    };
    ([(CONTENT_TYPE, content_type)], content).into_response()
}

pub async fn test_report(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<Response, ApiError> {
    let format = format_of(&params)?;
    let input = assemble::test_report_input(
        &state.store,
        &state.config.project.name,
        params.threshold.unwrap_or(0.3),
        params.window.unwrap_or(10),
    )?;
    let content = match format {
        ReportFormat::Html => reports::render_test_html(&input),
        ReportFormat::Markdown => reports::render_test_markdown(&input),
    };
    Ok(respond(format, content))
}

pub async fn coverage_report(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<Response, ApiError> {
    let format = format_of(&params)?;
    let input = assemble::coverage_report_input(
        &state.store,
        &state.config.project.name,
        params.baseline.as_deref(),
        params.threshold.unwrap_or(1.0),
    )?;
    let content = match format {
        ReportFormat::Html => reports::render_coverage_html(&input),
        ReportFormat::Markdown => reports::render_coverage_markdown(&input),
    };
    Ok(respond(format, content))
}

pub async fn quality_report(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<Response, ApiError> {
    let format = format_of(&params)?;
    let input = assemble::quality_report_input(&state.store, &state.config.project.name)?;
    let content = match format {
        ReportFormat::Html => reports::render_quality_html(&input),
        ReportFormat::Markdown => reports::render_quality_markdown(&input),
    };
    Ok(respond(format, content))
}
