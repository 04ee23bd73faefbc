//! Best-effort extraction from raw CI job logs.
//!
//! Logs interleave many tools; any subset of the extracted data may be
//! empty. ANSI escapes are stripped first. When a pattern matches more
//! than once, the last match wins.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Final test summary counts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TestSummaryCounts {
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub duration_seconds: Option<f64>,
}

/// One failed test with its error text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTest {
    pub node_id: String,
    pub error: String,
}

/// Everything this parser could extract from one job log.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CiLogData {
    pub summary: Option<TestSummaryCounts>,
    pub failed_tests: Vec<FailedTest>,
    pub coverage_percent: Option<f64>,
    /// Raw `FILE:LINE:COL: CODE MSG` lines for the quality comparison.
    pub lint_lines: Vec<String>,
}

fn ansi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("ansi regex"))
}

fn summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // pytest-shaped: "== 3 passed, 1 failed, 2 skipped in 4.56s =="; the
    // count segments appear in any order and any subset.
    RE.get_or_init(|| {
        Regex::new(r"=+\s+(?P<body>[^=]*?\b(?:passed|failed|skipped|error)\b[^=]*?)\s+=+")
            .expect("summary regex")
    })
}

fn count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?P<n>\d+)\s+(?P<kind>passed|failed|skipped|error(?:s)?)").expect("count regex"))
}

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"in\s+(?P<secs>\d+(?:\.\d+)?)s").expect("duration regex"))
}

fn failed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^FAILED\s+(?P<node>\S+?)(?:\s+-\s+(?P<err>.*))?$").expect("failed regex")
    })
}

fn coverage_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^TOTAL\s+.*?(?P<pct>\d+(?:\.\d+)?)%\s*$").expect("coverage regex")
    })
}

fn lint_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^.+?:\d+:\d+:\s*[A-Z]+\d+\s+.+$").expect("lint line regex")
    })
}

/// Strip ANSI escape sequences.
pub fn strip_ansi(input: &str) -> String {
    ansi_re().replace_all(input, "").into_owned()
}

/// Extract structured data from one job's raw log.
pub fn parse(log: &str) -> CiLogData {
    let clean = strip_ansi(log);
    let mut data = CiLogData::default();

    for raw_line in clean.lines() {
        let line = raw_line.trim_end();

        if let Some(caps) = summary_re().captures(line) {
            let body = &caps["body"];
            let mut counts = TestSummaryCounts::default();
            for c in count_re().captures_iter(body) {
                let n: u64 = c["n"].parse().unwrap_or(0);
                match &c["kind"] {
                    "passed" => counts.passed = n,
                    "failed" => counts.failed = n,
                    "skipped" => counts.skipped = n,
                    _ => counts.failed += n,
                }
            }
            counts.duration_seconds = duration_re()
                .captures(line)
                .and_then(|d| d["secs"].parse().ok());
            // Later summary lines override earlier ones.
            data.summary = Some(counts);
            continue;
        }

        if let Some(caps) = failed_re().captures(line.trim_start()) {
            let node_id = caps["node"].to_string();
            let error = caps
                .name("err")
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            // A later FAILED line for the same node wins.
            if let Some(existing) = data.failed_tests.iter_mut().find(|f| f.node_id == node_id) {
                existing.error = error;
            } else {
                data.failed_tests.push(FailedTest { node_id, error });
            }
            continue;
        }

        if let Some(caps) = coverage_re().captures(line.trim_start()) {
            if let Ok(pct) = caps["pct"].parse() {
                data.coverage_percent = Some(pct);
            }
            continue;
        }

        if lint_re().is_match(line.trim_start()) {
            data.lint_lines.push(line.trim_start().to_string());
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_summary_line() {
        let log = "collecting...\n========= 3 passed, 1 failed, 2 skipped in 4.56s =========\n";
        let data = parse(log);
        let summary = data.summary.unwrap();
        assert_eq!(summary.passed, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.duration_seconds, Some(4.56));
    }

    #[test]
    fn last_summary_wins() {
        let log = "== 1 passed in 0.1s ==\nretrying...\n== 2 passed, 1 failed in 0.2s ==\n";
        let summary = parse(log).summary.unwrap();
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn extracts_failed_tests_and_errors() {
        let log = "FAILED tests/net.py::test_tcp - ConnectionError: refused\n";
        let data = parse(log);
        assert_eq!(data.failed_tests.len(), 1);
        assert_eq!(data.failed_tests[0].node_id, "tests/net.py::test_tcp");
        assert_eq!(data.failed_tests[0].error, "ConnectionError: refused");
    }

    #[test]
    fn extracts_coverage_total() {
        let log = "Name    Stmts   Miss  Cover\nTOTAL     200     30    85%\n";
        assert_eq!(parse(log).coverage_percent, Some(85.0));
    }

    #[test]
    fn collects_lint_lines() {
        let log = "src/x.py:10:5: E501 line too long\nunrelated\n";
        let data = parse(log);
        assert_eq!(data.lint_lines, vec!["src/x.py:10:5: E501 line too long"]);
    }

    #[test]
    fn strips_ansi_escapes() {
        let log = "\u{1b}[32m== 1 passed in 0.1s ==\u{1b}[0m\n";
        assert_eq!(parse(log).summary.unwrap().passed, 1);
    }

    #[test]
    fn empty_log_yields_empty_data() {
        assert_eq!(parse(""), CiLogData::default());
    }
}
