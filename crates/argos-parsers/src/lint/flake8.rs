//! Flake8-style output: one violation per line, `FILE:LINE:COL: CODE MSG`.
//! Non-matching lines are tool noise and are skipped, not errors.

use std::sync::OnceLock;

use regex::Regex;

use argos_core::errors::ParseError;
use argos_core::types::entity::Severity;

use super::{normalize_path, LintViolationData};

fn line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<file>.+?):(?P<line>\d+):(?P<col>\d+):\s*(?P<code>[A-Z]+\d+)\s+(?P<msg>.+)$")
            .expect("flake8 line regex")
    })
}

/// Severity by code prefix: E/F error, W/C/N/B/S warning, D/I/T info.
fn severity_for(code: &str) -> Severity {
    match code.chars().next() {
        Some('E') | Some('F') => Severity::Error,
        Some('W') | Some('C') | Some('N') | Some('B') | Some('S') => Severity::Warning,
        Some('D') | Some('I') | Some('T') => Severity::Info,
        _ => Severity::Warning,
    }
}

pub(super) fn parse(input: &str) -> Result<Vec<LintViolationData>, ParseError> {
    let mut violations = Vec::new();
    for line in input.lines() {
        let Some(caps) = line_re().captures(line.trim_end()) else {
            continue;
        };
        // Overflowing line numbers are treated as noise, like any other
        // non-matching line.
        let Ok(line_no) = caps["line"].parse::<u32>() else {
            continue;
        };
        let col: u32 = caps["col"].parse().unwrap_or(0);
        let code = caps["code"].to_string();
        violations.push(LintViolationData {
            file_path: normalize_path(&caps["file"]),
            line: line_no,
            column: Some(col),
            severity: severity_for(&code),
            code,
            message: caps["msg"].to_string(),
        });
    }
    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_error_and_warning() {
        let input = "src/x.py:10:5: E501 line too long\nsrc/x.py:11:1: W503 break before operator\n";
        let violations = parse(input).unwrap();
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].code, "E501");
        assert_eq!(violations[0].severity, Severity::Error);
        assert_eq!(violations[0].line, 10);
        assert_eq!(violations[0].column, Some(5));
        assert_eq!(violations[1].severity, Severity::Warning);
    }

    #[test]
    fn severity_prefixes() {
        assert_eq!(severity_for("F401"), Severity::Error);
        assert_eq!(severity_for("C901"), Severity::Warning);
        assert_eq!(severity_for("D100"), Severity::Info);
        assert_eq!(severity_for("T201"), Severity::Info);
    }

    #[test]
    fn noise_lines_are_skipped() {
        let input = "some banner\nsrc/x.py:1:1: E101 bad indent\n\ntrailing noise";
        let violations = parse(input).unwrap();
        assert_eq!(violations.len(), 1);
    }
}
