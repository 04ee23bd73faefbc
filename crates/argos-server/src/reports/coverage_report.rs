//! Coverage report.

use serde::{Deserialize, Serialize};

use super::{card, escape, page};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRow {
    pub file_path: String,
    pub coverage_percentage: f64,
    pub total_statements: i64,
    pub covered_statements: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendPoint {
    pub execution_id: String,
    pub total_coverage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionRow {
    pub file_path: String,
    pub baseline: f64,
    pub current: f64,
    pub drop: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageReportInput {
    pub project: String,
    pub overall: f64,
    pub files: Vec<FileRow>,
    pub trend: Vec<TrendPoint>,
    pub regressions: Option<Vec<RegressionRow>>,
}

pub fn render_coverage_html(input: &CoverageReportInput) -> String {
    let mut body = String::new();

    body.push_str("<div class=\"cards\">\n");
    body.push_str(&card(
        "overall coverage",
        &format!("{:.2}%", input.overall),
        if input.overall >= 80.0 { "pass" } else { "fail" },
    ));
    body.push_str(&card("files", &input.files.len().to_string(), ""));
    body.push_str("</div>\n");

    body.push_str(
        "<h2>Per-file coverage</h2>\n<table><tr><th>file</th><th>coverage</th><th>covered / total</th></tr>\n",
    );
    for row in &input.files {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{:.2}%</td><td>{} / {}</td></tr>\n",
            escape(&row.file_path),
            row.coverage_percentage,
            row.covered_statements,
            row.total_statements,
        ));
    }
    body.push_str("</table>\n");

    if let Some(regressions) = &input.regressions {
        body.push_str(
            "<h2>Regressions</h2>\n<table><tr><th>file</th><th>baseline</th><th>current</th><th>drop</th></tr>\n",
        );
        for row in regressions {
            body.push_str(&format!(
                "<tr><td>{}</td><td>{:.2}%</td><td>{:.2}%</td><td class=\"fail\">-{:.2}pp</td></tr>\n",
                escape(&row.file_path),
                row.baseline,
                row.current,
                row.drop,
            ));
        }
        body.push_str("</table>\n");
    }

    let chart = serde_json::json!({
        "kind": "coverage-trend",
        "trend": input.trend,
    });
    page(&format!("Coverage report — {}", input.project), &body, &chart)
}

pub fn render_coverage_markdown(input: &CoverageReportInput) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Coverage report — {}\n\n", input.project));
    out.push_str(&format!("Overall: **{:.2}%**\n\n", input.overall));

    out.push_str("## Per-file coverage\n\n| file | coverage | covered / total |\n|---|---|---|\n");
    for row in &input.files {
        out.push_str(&format!(
            "| {} | {:.2}% | {} / {} |\n",
            row.file_path, row.coverage_percentage, row.covered_statements, row.total_statements,
        ));
    }

    if let Some(regressions) = &input.regressions {
        out.push_str("\n## Regressions\n\n| file | baseline | current | drop |\n|---|---|---|---|\n");
        for row in regressions {
            out.push_str(&format!(
                "| {} | {:.2}% | {:.2}% | -{:.2}pp |\n",
                row.file_path, row.baseline, row.current, row.drop,
            ));
        }
    }

    out.push_str("\n## Trend\n\n| execution | coverage |\n|---|---|\n");
    for point in &input.trend {
        out.push_str(&format!("| {} | {:.2}% |\n", point.execution_id, point.total_coverage));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> CoverageReportInput {
        CoverageReportInput {
            project: "billing".to_string(),
            overall: 83.33,
            files: vec![FileRow {
                file_path: "src/x.py".to_string(),
                coverage_percentage: 75.0,
                total_statements: 4,
                covered_statements: 3,
            }],
            trend: vec![TrendPoint {
                execution_id: "local-20260101-000000".to_string(),
                total_coverage: 83.33,
            }],
            regressions: Some(vec![RegressionRow {
                file_path: "src/x.py".to_string(),
                baseline: 100.0,
                current: 95.0,
                drop: 5.0,
            }]),
        }
    }

    #[test]
    fn html_is_deterministic_and_complete() {
        let a = render_coverage_html(&input());
        assert_eq!(a, render_coverage_html(&input()));
        assert!(a.contains("83.33%"));
        assert!(a.contains("Regressions"));
    }

    #[test]
    fn markdown_lists_regressions() {
        let md = render_coverage_markdown(&input());
        assert!(md.contains("| src/x.py | 100.00% | 95.00% | -5.00pp |"));
    }
}
