//! Builds renderer inputs from store queries. Shared by the report
//! endpoints and the CLI `report` command.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};

use argos_core::errors::StoreError;
use argos_core::types::entity::Space;
use argos_engine::stats;
use argos_parsers::coverage::round2;
use argos_storage::queries::execution_history::HistoryFilter;
use argos_storage::ArgosStorageEngine;

use super::{coverage_report, quality_report, test_report};

const TREND_ROWS: usize = 5_000;
const TOP_N: usize = 10;

fn day_of(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Assemble the test-execution report input.
pub fn test_report_input(
    store: &ArgosStorageEngine,
    project: &str,
    threshold: f64,
    window: usize,
) -> Result<test_report::TestReportInput, StoreError> {
    let stats_rows = store.list_entity_statistics("test")?;
    let total_runs: i64 = stats_rows.iter().map(|s| s.total_runs).sum();
    let passed: i64 = stats_rows.iter().map(|s| s.passed).sum();
    let failed: i64 = stats_rows.iter().map(|s| s.failed).sum();
    let skipped: i64 = stats_rows.iter().map(|s| s.skipped).sum();
    let success_rate = if total_runs > 0 {
        passed as f64 / total_runs as f64
    } else {
        0.0
    };
    let avg_duration = if total_runs > 0 {
        stats_rows
            .iter()
            .map(|s| s.avg_duration * s.total_runs as f64)
            .sum::<f64>()
            / total_runs as f64
    } else {
        0.0
    };

    // Daily trend over recent history; the last seven days against the
    // seven before them give the headline delta.
    let history = store.get_execution_history(&HistoryFilter {
        entity_type: Some("test".to_string()),
        limit: Some(TREND_ROWS),
        ..HistoryFilter::default()
    })?;

    let mut by_day: BTreeMap<String, (i64, i64)> = BTreeMap::new();
    for row in &history {
        let entry = by_day.entry(day_of(row.timestamp)).or_insert((0, 0));
        match row.status.as_str() {
            "PASSED" => entry.0 += 1,
            "FAILED" | "ERROR" => entry.1 += 1,
            _ => {}
        }
    }
    let trend: Vec<test_report::DailyTrend> = by_day
        .into_iter()
        .map(|(date, (passed, failed))| test_report::DailyTrend { date, passed, failed })
        .collect();

    let rate_of = |days: &[test_report::DailyTrend]| -> f64 {
        let passed: i64 = days.iter().map(|d| d.passed).sum();
        let failed: i64 = days.iter().map(|d| d.failed).sum();
        if passed + failed > 0 {
            passed as f64 / (passed + failed) as f64 * 100.0
        } else {
            0.0
        }
    };
    let seven_day_delta = if trend.len() > 7 {
        let split = trend.len() - 7;
        rate_of(&trend[split..]) - rate_of(&trend[..split])
    } else {
        0.0
    };

    let flaky = store
        .with_reader(|conn| stats::flaky(conn, threshold, window, None))?
        .into_iter()
        .take(TOP_N)
        .map(|f| test_report::FlakyRow {
            entity_id: f.entity_id,
            failure_rate: f.failure_rate,
            total_runs: f.total_runs,
        })
        .collect();

    let mut slowest_rows = stats_rows;
    slowest_rows.sort_by(|a, b| {
        b.avg_duration
            .partial_cmp(&a.avg_duration)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
    let slowest = slowest_rows
        .into_iter()
        .take(TOP_N)
        .map(|s| test_report::SlowTest {
            entity_id: s.entity_id,
            avg_duration: s.avg_duration,
        })
        .collect();

    Ok(test_report::TestReportInput {
        project: project.to_string(),
        total_runs,
        passed,
        failed,
        skipped,
        success_rate,
        avg_duration,
        seven_day_delta,
        trend,
        flaky,
        slowest,
    })
}

/// Assemble the coverage report input. `baseline` adds the regression
/// list against that execution.
pub fn coverage_report_input(
    store: &ArgosStorageEngine,
    project: &str,
    baseline: Option<&str>,
    threshold: f64,
) -> Result<coverage_report::CoverageReportInput, StoreError> {
    let summaries = store.get_coverage_summaries(Some(Space::Local.as_str()), Some(30))?;
    let latest = summaries.first().ok_or_else(|| StoreError::NotFound {
        what: "coverage data".to_string(),
    })?;

    let files = store
        .coverage_history_for_execution(&latest.execution_id)?
        .into_iter()
        .map(|row| coverage_report::FileRow {
            file_path: row.file_path,
            coverage_percentage: row.coverage_percentage,
            total_statements: row.total_statements,
            covered_statements: row.covered_statements,
        })
        .collect();

    // Oldest first so the chart reads left to right.
    let trend = summaries
        .iter()
        .rev()
        .map(|s| coverage_report::TrendPoint {
            execution_id: s.execution_id.clone(),
            total_coverage: s.total_coverage,
        })
        .collect();

    let regressions = match baseline {
        Some(baseline) => {
            if store.get_coverage_summary(baseline)?.is_none() {
                return Err(StoreError::NotFound {
                    what: format!("coverage for {baseline}"),
                });
            }
            let current_rows = store.coverage_history_for_execution(&latest.execution_id)?;
            let baseline_rows = store.coverage_history_for_execution(baseline)?;
            let mut rows = Vec::new();
            for cur in &current_rows {
                if let Some(base) = baseline_rows.iter().find(|b| b.file_path == cur.file_path) {
                    let drop = base.coverage_percentage - cur.coverage_percentage;
                    if drop >= threshold {
                        rows.push(coverage_report::RegressionRow {
                            file_path: cur.file_path.clone(),
                            baseline: base.coverage_percentage,
                            current: cur.coverage_percentage,
                            drop: round2(drop),
                        });
                    }
                }
            }
            rows.sort_by(|a, b| {
                b.drop
                    .partial_cmp(&a.drop)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.file_path.cmp(&b.file_path))
            });
            Some(rows)
        }
        None => None,
    };

    Ok(coverage_report::CoverageReportInput {
        project: project.to_string(),
        overall: latest.total_coverage,
        files,
        trend,
        regressions,
    })
}

/// Assemble the quality report input.
pub fn quality_report_input(
    store: &ArgosStorageEngine,
    project: &str,
) -> Result<quality_report::QualityReportInput, StoreError> {
    let local = store.latest_lint_summary_per_validator(Space::Local.as_str())?;

    let mut code_totals: BTreeMap<String, i64> = BTreeMap::new();
    let mut validators = Vec::with_capacity(local.len());
    for summary in &local {
        validators.push(quality_report::ValidatorSummary {
            validator: summary.validator.clone(),
            total_violations: summary.total_violations,
            errors: summary.errors,
            warnings: summary.warnings,
            info: summary.info,
            files_scanned: summary.files_scanned,
        });
        if let Ok(by_code) = serde_json::from_str::<BTreeMap<String, i64>>(&summary.by_code_json) {
            for (code, count) in by_code {
                *code_totals.entry(code).or_insert(0) += count;
            }
        }
    }

    let mut top_codes: Vec<quality_report::CodeCount> = code_totals
        .into_iter()
        .map(|(code, count)| quality_report::CodeCount { code, count })
        .collect();
    top_codes.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.code.cmp(&b.code)));
    top_codes.truncate(TOP_N);

    let mut top_files: Vec<quality_report::FileCount> = Vec::new();
    for summary in &local {
        for row in store.worst_quality_files(&summary.validator, TOP_N)? {
            match top_files.iter_mut().find(|f| f.file_path == row.file_path) {
                Some(existing) => existing.total_violations += row.total_violations,
                None => top_files.push(quality_report::FileCount {
                    file_path: row.file_path,
                    total_violations: row.total_violations,
                }),
            }
        }
    }
    top_files.sort_by(|a, b| {
        b.total_violations
            .cmp(&a.total_violations)
            .then_with(|| a.file_path.cmp(&b.file_path))
    });
    top_files.truncate(TOP_N);

    let comparison: Vec<quality_report::SpaceDelta> =
        crate::analytics::quality_comparison(store, None)?
            .into_iter()
            .map(|d| quality_report::SpaceDelta {
                validator: d.validator,
                local_total: d.local_total,
                ci_total: d.ci_total,
                direction: d.direction,
            })
            .collect();
    let comparison = if comparison.is_empty() { None } else { Some(comparison) };

    Ok(quality_report::QualityReportInput {
        project: project.to_string(),
        validators,
        top_codes,
        top_files,
        comparison,
    })
}
