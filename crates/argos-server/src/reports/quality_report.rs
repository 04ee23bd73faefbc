//! Code-quality report.

use serde::{Deserialize, Serialize};

use super::{card, escape, page};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorSummary {
    pub validator: String,
    pub total_violations: i64,
    pub errors: i64,
    pub warnings: i64,
    pub info: i64,
    pub files_scanned: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeCount {
    pub code: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCount {
    pub file_path: String,
    pub total_violations: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceDelta {
    pub validator: String,
    pub local_total: Option<i64>,
    pub ci_total: Option<i64>,
    pub direction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReportInput {
    pub project: String,
    pub validators: Vec<ValidatorSummary>,
    pub top_codes: Vec<CodeCount>,
    pub top_files: Vec<FileCount>,
    pub comparison: Option<Vec<SpaceDelta>>,
}

pub fn render_quality_html(input: &QualityReportInput) -> String {
    let mut body = String::new();

    let total: i64 = input.validators.iter().map(|v| v.total_violations).sum();
    body.push_str("<div class=\"cards\">\n");
    body.push_str(&card(
        "total violations",
        &total.to_string(),
        if total == 0 { "pass" } else { "fail" },
    ));
    body.push_str(&card("validators", &input.validators.len().to_string(), ""));
    body.push_str("</div>\n");

    body.push_str(
        "<h2>Per-validator summary</h2>\n<table><tr><th>validator</th><th>total</th><th>errors</th><th>warnings</th><th>info</th><th>files</th></tr>\n",
    );
    for v in &input.validators {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td class=\"fail\">{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&v.validator), v.total_violations, v.errors, v.warnings, v.info, v.files_scanned,
        ));
    }
    body.push_str("</table>\n");

    body.push_str("<h2>Top violation codes</h2>\n<table><tr><th>code</th><th>count</th></tr>\n");
    for c in &input.top_codes {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>\n",
            escape(&c.code),
            c.count
        ));
    }
    body.push_str("</table>\n");

    body.push_str("<h2>Top files</h2>\n<table><tr><th>file</th><th>violations</th></tr>\n");
    for f in &input.top_files {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>\n",
            escape(&f.file_path),
            f.total_violations
        ));
    }
    body.push_str("</table>\n");

    if let Some(comparison) = &input.comparison {
        body.push_str(
            "<h2>Local vs CI</h2>\n<table><tr><th>validator</th><th>local</th><th>ci</th><th></th></tr>\n",
        );
        for delta in comparison {
            body.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape(&delta.validator),
                delta.local_total.map_or("—".to_string(), |n| n.to_string()),
                delta.ci_total.map_or("—".to_string(), |n| n.to_string()),
                escape(&delta.direction),
            ));
        }
        body.push_str("</table>\n");
    }

    let chart = serde_json::json!({
        "kind": "quality-codes",
        "codes": input.top_codes,
    });
    page(&format!("Quality report — {}", input.project), &body, &chart)
}

pub fn render_quality_markdown(input: &QualityReportInput) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Quality report — {}\n\n", input.project));

    out.push_str("## Per-validator summary\n\n| validator | total | errors | warnings | info | files |\n|---|---|---|---|---|---|\n");
    for v in &input.validators {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            v.validator, v.total_violations, v.errors, v.warnings, v.info, v.files_scanned,
        ));
    }

    out.push_str("\n## Top violation codes\n\n| code | count |\n|---|---|\n");
    for c in &input.top_codes {
        out.push_str(&format!("| {} | {} |\n", c.code, c.count));
    }

    out.push_str("\n## Top files\n\n| file | violations |\n|---|---|\n");
    for f in &input.top_files {
        out.push_str(&format!("| {} | {} |\n", f.file_path, f.total_violations));
    }

    if let Some(comparison) = &input.comparison {
        out.push_str("\n## Local vs CI\n\n| validator | local | ci | direction |\n|---|---|---|---|\n");
        for delta in comparison {
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                delta.validator,
                delta.local_total.map_or("—".to_string(), |n| n.to_string()),
                delta.ci_total.map_or("—".to_string(), |n| n.to_string()),
                delta.direction,
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> QualityReportInput {
        QualityReportInput {
            project: "billing".to_string(),
            validators: vec![ValidatorSummary {
                validator: "flake8".to_string(),
                total_violations: 2,
                errors: 1,
                warnings: 1,
                info: 0,
                files_scanned: 1,
            }],
            top_codes: vec![CodeCount { code: "E501".to_string(), count: 1 }],
            top_files: vec![FileCount {
                file_path: "src/x.py".to_string(),
                total_violations: 2,
            }],
            comparison: Some(vec![SpaceDelta {
                validator: "flake8".to_string(),
                local_total: Some(2),
                ci_total: Some(5),
                direction: "↓".to_string(),
            }]),
        }
    }

    #[test]
    fn html_is_deterministic() {
        let a = render_quality_html(&input());
        assert_eq!(a, render_quality_html(&input()));
        assert!(a.contains("flake8"));
        assert!(a.contains("Local vs CI"));
    }

    #[test]
    fn markdown_shows_direction() {
        let md = render_quality_markdown(&input());
        assert!(md.contains("| flake8 | 2 | 5 | ↓ |"));
    }
}
