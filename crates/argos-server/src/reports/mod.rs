//! Report renderers: deterministic HTML/Markdown from query results.
//!
//! Renderers are pure functions of their input structs; no clock access,
//! no store access. Chart payloads are inlined as JSON consumed by the
//! browser-side chart code.

pub mod assemble;
pub mod coverage_report;
pub mod quality_report;
pub mod test_report;

pub use coverage_report::{render_coverage_html, render_coverage_markdown, CoverageReportInput};
pub use quality_report::{render_quality_html, render_quality_markdown, QualityReportInput};
pub use test_report::{render_test_html, render_test_markdown, TestReportInput};

/// Output format selector shared by the report endpoints and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Html,
    Markdown,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "html" => Ok(ReportFormat::Html),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            other => Err(format!("unknown report format: {other}")),
        }
    }
}

/// Minimal HTML escaping for interpolated values.
pub(crate) fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Standard page shell shared by all HTML reports.
pub(crate) fn page(title: &str, body: &str, chart_data: &serde_json::Value) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: -apple-system, "Segoe UI", sans-serif; margin: 2rem; color: #1a1a2e; }}
h1 {{ font-size: 1.5rem; }}
h2 {{ font-size: 1.15rem; margin-top: 2rem; }}
table {{ border-collapse: collapse; width: 100%; }}
th, td {{ text-align: left; padding: 0.4rem 0.75rem; border-bottom: 1px solid #e0e0e8; }}
th {{ background: #f4f4f8; }}
.cards {{ display: flex; gap: 1rem; flex-wrap: wrap; }}
.card {{ border: 1px solid #e0e0e8; border-radius: 8px; padding: 1rem 1.5rem; min-width: 8rem; }}
.card .value {{ font-size: 1.6rem; font-weight: 600; }}
.card .label {{ color: #6a6a7a; font-size: 0.85rem; }}
.pass {{ color: #1a7f4b; }}
.fail {{ color: #c0392b; }}
</style>
</head>
<body>
<h1>{title}</h1>
{body}
<script type="application/json" id="chart-data">{chart}</script>
</body>
</html>
"#,
        title = escape(title),
        body = body,
        chart = chart_data,
    )
}

/// A summary card.
pub(crate) fn card(label: &str, value: &str, class: &str) -> String {
    format!(
        r#"<div class="card"><div class="value {class}">{value}</div><div class="label">{label}</div></div>"#,
        class = class,
        value = escape(value),
        label = escape(label),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_handles_markup() {
        assert_eq!(escape("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }

    #[test]
    fn format_parses() {
        assert_eq!("html".parse::<ReportFormat>().unwrap(), ReportFormat::Html);
        assert_eq!("md".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
        assert!("pdf".parse::<ReportFormat>().is_err());
    }
}
