//! Test-execution report.

use serde::{Deserialize, Serialize};

use super::{card, escape, page};

/// One day of the trend series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyTrend {
    /// `YYYY-MM-DD`.
    pub date: String,
    pub passed: i64,
    pub failed: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlakyRow {
    pub entity_id: String,
    pub failure_rate: f64,
    pub total_runs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowTest {
    pub entity_id: String,
    pub avg_duration: f64,
}

/// Everything the test report renders. Assembled from store queries by
/// the caller; the renderer itself never touches the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReportInput {
    pub project: String,
    pub total_runs: i64,
    pub passed: i64,
    pub failed: i64,
    pub skipped: i64,
    pub success_rate: f64,
    pub avg_duration: f64,
    /// Pass-rate delta over the last seven days of the trend, in percent
    /// points.
    pub seven_day_delta: f64,
    pub trend: Vec<DailyTrend>,
    pub flaky: Vec<FlakyRow>,
    pub slowest: Vec<SlowTest>,
}

pub fn render_test_html(input: &TestReportInput) -> String {
    let mut body = String::new();

    body.push_str("<div class=\"cards\">\n");
    body.push_str(&card("total runs", &input.total_runs.to_string(), ""));
    body.push_str(&card("passed", &input.passed.to_string(), "pass"));
    body.push_str(&card("failed", &input.failed.to_string(), "fail"));
    body.push_str(&card("skipped", &input.skipped.to_string(), ""));
    body.push_str(&card(
        "success rate",
        &format!("{:.1}%", input.success_rate * 100.0),
        if input.success_rate >= 0.9 { "pass" } else { "fail" },
    ));
    body.push_str(&card("avg duration", &format!("{:.2}s", input.avg_duration), ""));
    body.push_str(&card(
        "7-day trend",
        &format!("{:+.1}pp", input.seven_day_delta),
        if input.seven_day_delta >= 0.0 { "pass" } else { "fail" },
    ));
    body.push_str("</div>\n");

    body.push_str("<h2>Flaky tests</h2>\n<table><tr><th>test</th><th>failure rate</th><th>runs</th></tr>\n");
    for row in &input.flaky {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{:.0}%</td><td>{}</td></tr>\n",
            escape(&row.entity_id),
            row.failure_rate * 100.0,
            row.total_runs,
        ));
    }
    body.push_str("</table>\n");

    body.push_str("<h2>Slowest tests</h2>\n<table><tr><th>test</th><th>avg duration</th></tr>\n");
    for row in &input.slowest {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{:.2}s</td></tr>\n",
            escape(&row.entity_id),
            row.avg_duration,
        ));
    }
    body.push_str("</table>\n");

    let chart = serde_json::json!({
        "kind": "test-trend",
        "trend": input.trend,
    });
    page(&format!("Test report — {}", input.project), &body, &chart)
}

pub fn render_test_markdown(input: &TestReportInput) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Test report — {}\n\n", input.project));
    out.push_str(&format!(
        "| total | passed | failed | skipped | success | avg duration | 7-day |\n\
         |---|---|---|---|---|---|---|\n\
         | {} | {} | {} | {} | {:.1}% | {:.2}s | {:+.1}pp |\n\n",
        input.total_runs,
        input.passed,
        input.failed,
        input.skipped,
        input.success_rate * 100.0,
        input.avg_duration,
        input.seven_day_delta,
    ));

    out.push_str("## Flaky tests\n\n| test | failure rate | runs |\n|---|---|---|\n");
    for row in &input.flaky {
        out.push_str(&format!(
            "| {} | {:.0}% | {} |\n",
            row.entity_id,
            row.failure_rate * 100.0,
            row.total_runs,
        ));
    }

    out.push_str("\n## Slowest tests\n\n| test | avg duration |\n|---|---|\n");
    for row in &input.slowest {
        out.push_str(&format!("| {} | {:.2}s |\n", row.entity_id, row.avg_duration));
    }

    out.push_str("\n## Daily trend\n\n| date | passed | failed |\n|---|---|---|\n");
    for day in &input.trend {
        out.push_str(&format!("| {} | {} | {} |\n", day.date, day.passed, day.failed));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> TestReportInput {
        TestReportInput {
            project: "billing".to_string(),
            total_runs: 42,
            passed: 39,
            failed: 2,
            skipped: 1,
            success_rate: 0.928,
            avg_duration: 0.35,
            seven_day_delta: 1.5,
            trend: vec![DailyTrend { date: "2026-01-01".to_string(), passed: 10, failed: 1 }],
            flaky: vec![FlakyRow {
                entity_id: "tests/a.py::t1".to_string(),
                failure_rate: 0.5,
                total_runs: 10,
            }],
            slowest: vec![SlowTest {
                entity_id: "tests/slow.py::t9".to_string(),
                avg_duration: 3.2,
            }],
        }
    }

    #[test]
    fn html_is_deterministic() {
        let a = render_test_html(&input());
        let b = render_test_html(&input());
        assert_eq!(a, b);
        assert!(a.contains("tests/a.py::t1"));
        assert!(a.contains("chart-data"));
    }

    #[test]
    fn markdown_contains_sections() {
        let md = render_test_markdown(&input());
        assert!(md.starts_with("# Test report — billing"));
        assert!(md.contains("## Flaky tests"));
        assert!(md.contains("| 2026-01-01 | 10 | 1 |"));
    }
}
