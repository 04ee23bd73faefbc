//! Route table. Entity ids contain `::` and `/`, so they travel as query
//! parameters; only execution ids, rule names, and numeric remote ids
//! appear in paths.

pub mod ci;
pub mod coverage;
pub mod executions;
pub mod health;
pub mod lint;
pub mod reports;
pub mod rules;
pub mod stats;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health))
        // Executions
        .route(
            "/api/executions",
            get(executions::list).post(executions::start),
        )
        .route("/api/executions/{id}", get(executions::status))
        .route("/api/executions/{id}/cancel", post(executions::cancel))
        .route("/api/executions/{id}/ws", get(executions::ws))
        // Rules
        .route("/api/rules", get(rules::list).post(rules::create))
        .route(
            "/api/rules/{name}",
            get(rules::get_one).put(rules::update).delete(rules::delete),
        )
        // Statistics
        .route("/api/statistics", get(stats::list))
        .route("/api/statistics/entity", get(stats::entity))
        .route("/api/statistics/flaky", get(stats::flaky))
        // Comparison
        .route("/api/comparison/entity", get(stats::comparison))
        .route(
            "/api/comparison/platform-failures",
            get(stats::platform_failures),
        )
        // Lint
        .route("/api/lint/summaries", get(lint::summaries))
        .route("/api/lint/violations", get(lint::violations))
        .route("/api/lint/comparison", get(lint::comparison))
        // Coverage
        .route("/api/coverage/summaries", get(coverage::summaries))
        .route("/api/coverage/history", get(coverage::history))
        .route("/api/coverage/regressions", get(coverage::regressions))
        // CI
        .route("/api/ci/runs", get(ci::list_runs))
        .route("/api/ci/runs/{run_id}/jobs", get(ci::jobs))
        .route("/api/ci/runs/{run_id}/fetch", post(ci::fetch_run))
        .route("/api/ci/jobs/{job_id}/log", get(ci::job_log))
        .route("/api/ci/jobs/{job_id}/parse", get(ci::parse_job_log))
        .route("/api/ci/compare", get(ci::compare))
        // Reports
        .route("/api/reports/test", get(reports::test_report))
        .route("/api/reports/coverage", get(reports::coverage_report))
        .route("/api/reports/quality", get(reports::quality_report))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
